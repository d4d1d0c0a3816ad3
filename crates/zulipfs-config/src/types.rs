use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// How service-native names are turned into path segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NameStrategy {
    /// Only escape the path separator.
    EscapeOnly,
    /// Escape the separator and replace pictographic glyphs with `:shortcode:` aliases.
    #[default]
    DecorativeSymbols,
}

/// What a topic file's content represents and when it is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Append each newer message to everything seen so far.
    #[default]
    AccumulateLatest,
    /// Replace the content with the newest message on every read.
    RefetchReplace,
}

/// Time zone used for the `[timestamp]` header of rendered messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RenderTimezone {
    #[default]
    Local,
    Utc,
}

/// Human-readable duration (e.g., "200ms", "30s", "5m").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HumanDuration(pub std::time::Duration);

impl Default for HumanDuration {
    fn default() -> Self {
        HumanDuration(std::time::Duration::from_secs(0))
    }
}

impl HumanDuration {
    pub fn from_secs(secs: u64) -> Self {
        HumanDuration(std::time::Duration::from_secs(secs))
    }

    pub fn as_duration(&self) -> std::time::Duration {
        self.0
    }
}

impl FromStr for HumanDuration {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();

        let split = s
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| format!("Missing unit in duration: {}", s))?;
        let (num_str, unit) = s.split_at(split);

        let num: u64 = num_str
            .parse()
            .map_err(|_| format!("Invalid number in duration: {}", s))?;

        let duration = match unit {
            "ms" => std::time::Duration::from_millis(num),
            "s" => std::time::Duration::from_secs(num),
            "m" => std::time::Duration::from_secs(num * 60),
            "h" => std::time::Duration::from_secs(num * 3600),
            "d" => std::time::Duration::from_secs(num * 86400),
            _ => return Err(format!("Unknown duration unit: {}", unit)),
        };

        Ok(HumanDuration(duration))
    }
}

impl fmt::Display for HumanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.as_secs();
        let millis = self.0.as_millis();

        if millis < 1000 || millis % 1000 != 0 {
            write!(f, "{}ms", millis)
        } else if secs < 60 || secs % 60 != 0 {
            write!(f, "{}s", secs)
        } else if secs < 3600 || secs % 3600 != 0 {
            write!(f, "{}m", secs / 60)
        } else if secs < 86400 || secs % 86400 != 0 {
            write!(f, "{}h", secs / 3600)
        } else {
            write!(f, "{}d", secs / 86400)
        }
    }
}

impl Serialize for HumanDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for HumanDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        HumanDuration::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Connection settings for the messaging server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Base URL, e.g. `https://chat.example.com`.
    pub site: Option<String>,
    /// Account email used for HTTP basic auth.
    pub email: Option<String>,
    /// API key paired with `email`.
    pub api_key: Option<String>,
    /// Optional zuliprc file supplying any of the three fields above.
    pub zuliprc: Option<PathBuf>,
    /// Whole-request timeout.
    pub timeout: HumanDuration,
    /// Connection establishment timeout.
    pub connect_timeout: HumanDuration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            site: None,
            email: None,
            api_key: None,
            zuliprc: None,
            timeout: HumanDuration::from_secs(30),
            connect_timeout: HumanDuration::from_secs(5),
        }
    }
}

/// Name normalization settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamesConfig {
    pub strategy: NameStrategy,
}

/// Hierarchy and message cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Content policy for topic files.
    pub policy: CachePolicy,
    /// Maximum number of topics fetched per channel listing.
    pub topic_page_size: usize,
    /// Keep only the first N channels by creation order.
    pub channel_limit: Option<usize>,
}

pub const DEFAULT_TOPIC_PAGE_SIZE: usize = 50;

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            policy: CachePolicy::default(),
            topic_page_size: DEFAULT_TOPIC_PAGE_SIZE,
            channel_limit: None,
        }
    }
}

/// Message rendering settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub timezone: RenderTimezone,
}

/// FUSE mount options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    /// Filesystem name reported to the kernel.
    pub fs_name: String,
    /// Unmount automatically when the process exits.
    pub auto_unmount: bool,
    /// Let other users access the mount (needs `user_allow_other`).
    pub allow_other: bool,
}

impl Default for MountConfig {
    fn default() -> Self {
        MountConfig {
            fs_name: "zulipfs".to_string(),
            auto_unmount: true,
            allow_other: false,
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZulipFsConfig {
    pub transport: TransportConfig,
    pub names: NamesConfig,
    pub cache: CacheConfig,
    pub render: RenderConfig,
    pub mount: MountConfig,
}
