use std::io::Read;

use zulipfs_core::FilesystemAdapter;

pub async fn run(
    adapter: &FilesystemAdapter,
    path: &str,
    content: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let body = match content {
        Some(c) => c,
        None => {
            let mut buf = String::new();
            std::io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };

    if body.trim().is_empty() {
        return Err("Refusing to post an empty message".into());
    }

    let written = adapter.write(path, body.as_bytes(), 0).await?;
    println!("Posted {} bytes to {}", written, path);
    Ok(())
}
