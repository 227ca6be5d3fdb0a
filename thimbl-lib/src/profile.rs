use crate::error::{Error, ErrorKind};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage paths
#[derive(Clone, Debug, PartialEq)]
pub struct Profile {
    /// The base directory for all thimbl data
    pub base_dir: PathBuf,

    /// The cache file holding every known plan
    pub cache_file: PathBuf,

    /// Where the local plan is published for the finger daemon to serve
    pub plan_file: PathBuf,
}

impl Profile {
    pub fn new() -> Result<Profile, Error> {
        // Push "thimbl" to the config dir, or override with THIMBL_DIR
        let base_dir = match env::var("THIMBL_DIR") {
            Ok(dir) => {
                tracing::info!("Using THIMBL_DIR: {}", dir);
                PathBuf::from(dir)
            }
            Err(_) => {
                let mut base_dir = dirs::config_dir().ok_or::<Error>(
                    "Cannot find a directory to store application data.".into(),
                )?;
                base_dir.push("thimbl");
                base_dir
            }
        };

        let plan_file = match env::var("THIMBL_PLAN_FILE") {
            Ok(file) => PathBuf::from(file),
            Err(_) => {
                let mut plan_file =
                    dirs::home_dir().ok_or::<Error>(ErrorKind::NoHomeDirectory.into())?;
                plan_file.push(crate::PLAN_FILENAME);
                plan_file
            }
        };

        Profile::in_dir(base_dir, plan_file)
    }

    /// A profile rooted at an explicit directory. The directory is created
    /// if missing.
    pub fn in_dir<P: AsRef<Path>>(base_dir: P, plan_file: PathBuf) -> Result<Profile, Error> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir)?;

        let cache_file = {
            let mut cache_file = base_dir.clone();
            cache_file.push("data1.jsn");
            cache_file
        };

        Ok(Profile {
            base_dir,
            cache_file,
            plan_file,
        })
    }

    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("settings.json")
    }
}
