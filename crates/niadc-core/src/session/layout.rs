//! On-disk layout of one session
//!
//! ```text
//! <save_file_dir>/
//!   <YYYYmmddHHMMSS>/
//!     setting.txt
//!     <save_file_name>
//! ```

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Name of the settings dump inside the session directory
pub const SETTINGS_FILE_NAME: &str = "setting.txt";

/// Format of the session directory name
pub const SESSION_DIR_FORMAT: &str = "%Y%m%d%H%M%S";

/// Paths used by one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLayout {
    dir: PathBuf,
    data_file_name: String,
}

impl SessionLayout {
    /// Layout under `root` named after the current local time
    pub fn timestamped(root: &Path, data_file_name: &str) -> Self {
        Self::at_time(root, data_file_name, Local::now())
    }

    /// Layout under `root` named after `time`
    pub fn at_time(root: &Path, data_file_name: &str, time: DateTime<Local>) -> Self {
        let name = time.format(SESSION_DIR_FORMAT).to_string();
        Self::in_dir(root.join(name), data_file_name)
    }

    /// Layout rooted at an explicit session directory
    pub fn in_dir(dir: impl Into<PathBuf>, data_file_name: &str) -> Self {
        Self {
            dir: dir.into(),
            data_file_name: data_file_name.to_string(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE_NAME)
    }

    pub fn data_path(&self) -> PathBuf {
        self.dir.join(&self.data_file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_directory_named_after_time() {
        let time = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        let layout = SessionLayout::at_time(Path::new("/data"), "measured_data.csv", time);

        assert_eq!(layout.dir(), Path::new("/data/20240309070501"));
        assert_eq!(
            layout.settings_path(),
            PathBuf::from("/data/20240309070501/setting.txt")
        );
        assert_eq!(
            layout.data_path(),
            PathBuf::from("/data/20240309070501/measured_data.csv")
        );
    }

    #[test]
    fn test_explicit_dir() {
        let layout = SessionLayout::in_dir("/tmp/run", "out.csv");
        assert_eq!(layout.data_path(), PathBuf::from("/tmp/run/out.csv"));
    }
}
