/* src/setup/gen_conf.rs */

use super::config::TransferConfig;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

// Renders the default configuration, using the platform's RAM disk location.
fn render_default_config() -> String {
    let defaults = TransferConfig::default();
    format!(
        r#"[setup]
log_level = "info"
log_file = "transfer.log"
log_max_bytes = 10485760
log_backups = 5

[transfer]
ramdisk_root = {ramdisk:?}
storage_root = "Images"
extension = "jpg"
max_files_per_batch = 50
poll_interval_secs = 1.0
workers = 4
pop_timeout_ms = 1000
join_timeout_secs = 2.0
verify = "size"
dedup_capacity = 65536
"#,
        ramdisk = defaults.ramdisk_root.to_string_lossy()
    )
}

// Writes a default configuration file. An existing file is never overwritten.
pub fn generate_default_config<P: AsRef<Path>>(path: P) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path.as_ref())?;
    file.write_all(render_default_config().as_bytes())?;
    Ok(())
}
