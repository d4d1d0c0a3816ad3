use std::io::Write;

use zulipfs_core::FilesystemAdapter;

pub async fn run(adapter: &FilesystemAdapter, path: &str) -> Result<(), Box<dyn std::error::Error>> {
    // Attribute sizes can be placeholders, so read everything.
    let content = adapter.read(path, usize::MAX, 0).await?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&content)?;
    stdout.flush()?;

    Ok(())
}
