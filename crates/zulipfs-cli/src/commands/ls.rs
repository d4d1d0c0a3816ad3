use zulipfs_core::FilesystemAdapter;

pub async fn run(adapter: &FilesystemAdapter, path: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(|| "/".to_string());
    let entries = adapter.list(&path).await?;

    for name in entries.iter().filter(|n| *n != "." && *n != "..") {
        println!("{}", name);
    }

    Ok(())
}
