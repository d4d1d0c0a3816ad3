use chrono::{DateTime, Local};
use zulipfs_core::{Attributes, FilesystemAdapter, NodeKind};

pub async fn run(adapter: &FilesystemAdapter, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let attrs = adapter.attributes(path).await?;
    print!("{}", describe(path, &attrs));
    Ok(())
}

fn describe(path: &str, attrs: &Attributes) -> String {
    let kind = match attrs.kind {
        NodeKind::Directory => "directory",
        NodeKind::File => "file",
    };
    let modified: DateTime<Local> = attrs.modified.into();

    format!(
        "  Path: {}\n  Type: {}\n  Size: {}\n  Mode: {:o}\n  Modified: {}\n",
        path,
        kind,
        attrs.size,
        attrs.perm,
        modified.format("%Y-%m-%d %H:%M:%S %z"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_describe_file() {
        let attrs = Attributes {
            kind: NodeKind::File,
            size: 42,
            perm: 0o644,
            modified: UNIX_EPOCH + Duration::from_secs(1_704_103_200),
        };
        let out = describe("/general/greetings", &attrs);
        assert!(out.contains("Path: /general/greetings"));
        assert!(out.contains("Type: file"));
        assert!(out.contains("Size: 42"));
        assert!(out.contains("Mode: 644"));
    }

    #[test]
    fn test_describe_directory() {
        let attrs = Attributes {
            kind: NodeKind::Directory,
            size: 4096,
            perm: 0o755,
            modified: UNIX_EPOCH,
        };
        let out = describe("/general", &attrs);
        assert!(out.contains("Type: directory"));
        assert!(out.contains("Mode: 755"));
    }
}
