use std::path::PathBuf;

/// Model artifacts expected next to the detector.
pub const MODEL_FILES: [&str; 4] = [
    "detect.prototxt",
    "detect.caffemodel",
    "sr.prototxt",
    "sr.caffemodel",
];

#[derive(Debug, Clone)]
pub struct ModelFiles {
    dir: PathBuf,
}

impl ModelFiles {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `(file name, present)` for each artifact. Presence is informational.
    pub fn status(&self) -> Vec<(&'static str, bool)> {
        MODEL_FILES
            .iter()
            .map(|name| (*name, self.dir.join(name).is_file()))
            .collect()
    }

    pub fn all_present(&self) -> bool {
        self.status().iter().all(|(_, present)| *present)
    }
}
