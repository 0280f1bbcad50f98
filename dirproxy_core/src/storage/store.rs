use std::{fs, io, path::PathBuf};

use directories::ProjectDirs;
use log::warn;
use serde_json::Error as SerdeError;

use super::profile::{DirectoryProfile, ProfileId};

const DEFAULT_PROFILE_FILE: &str = "_default";

/// Directory of `<id>.json` profile files.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// `~/.config/dirproxy/profiles` on Linux, `%APPDATA%\dirproxy\profiles` on Windows, etc.
    pub fn new() -> io::Result<Self> {
        let proj = ProjectDirs::from("", "", "dirproxy")
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "Unable to locate config dir"))?;
        Self::at(proj.config_dir().join("profiles"))
    }

    pub fn at(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// File backing `id`. Ids that would leave the store directory, or that
    /// would share the default profile's file, are rejected.
    fn file_for(&self, id: &ProfileId) -> io::Result<PathBuf> {
        if id.is_default() {
            return Ok(self.dir.join(format!("{DEFAULT_PROFILE_FILE}.json")));
        }
        let stem = id.as_str();
        if stem == DEFAULT_PROFILE_FILE
            || stem.contains(['/', '\\', ':', '\0'])
            || stem.contains("..")
            || stem == "."
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("'{stem}' cannot be used as a profile file name"),
            ));
        }
        Ok(self.dir.join(format!("{stem}.json")))
    }

    /// Returns every stored profile (skips malformed files with a warning).
    pub fn list(&self) -> io::Result<Vec<DirectoryProfile>> {
        let mut out = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.extension().is_some_and(|e| e == "json") {
                continue;
            }
            match fs::File::open(&path)
                .and_then(|f| serde_json::from_reader(f).map_err(SerdeError::into))
            {
                Ok(profile) => out.push(profile),
                Err(e) => warn!("Could not read profile {:?}: {e}", path),
            }
        }
        out.sort_by(|a: &DirectoryProfile, b| a.id.cmp(&b.id));
        Ok(out)
    }

    /// Create or overwrite a profile.
    pub fn save(&self, profile: &DirectoryProfile) -> io::Result<()> {
        let file = fs::File::create(self.file_for(profile.id())?)?;
        serde_json::to_writer_pretty(file, profile).map_err(SerdeError::into)
    }

    /// Delete a profile (`Ok(true)` if removed, `Ok(false)` if it didn’t exist).
    pub fn delete(&self, id: &ProfileId) -> io::Result<bool> {
        match fs::remove_file(self.file_for(id)?) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }
}
