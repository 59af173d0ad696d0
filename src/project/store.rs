// Project store - Directory of ZIP project containers
//
// Container layout (<id>.scoresync):
//   manifest.json    project summary and format version
//   sync.ron         markers, bar count and audio duration
//   score/<name>     raw score bytes
//   audio/<name>     raw audio bytes

use crate::error::{SyncError, SyncResult};
use crate::project::types::*;
use crate::project::validate_project;
use chrono::Utc;
use std::fs::{self, File};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use walkdir::WalkDir;
use zip::{ZipArchive, ZipWriter};

pub const PROJECT_EXTENSION: &str = "scoresync";

const MANIFEST_ENTRY: &str = "manifest.json";
const SYNC_ENTRY: &str = "sync.ron";
const SCORE_DIR: &str = "score";
const AUDIO_DIR: &str = "audio";

/// Clears the in-progress flag when the save finishes, successfully or not
struct SaveGuard<'a>(&'a AtomicBool);

impl<'a> SaveGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> SyncResult<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SyncError::Busy("save"))?;
        Ok(Self(flag))
    }
}

impl Drop for SaveGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Durable key-value store of projects
pub struct ProjectStore {
    root: PathBuf,
    saving: AtomicBool,
}

impl ProjectStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open<P: AsRef<Path>>(root: P) -> SyncResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|e| {
            SyncError::Storage(format!(
                "Failed to create project directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            saving: AtomicBool::new(false),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a save is currently running
    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// Persist `project`, assigning its id on first save
    ///
    /// The project's id and timestamps are only updated once the container
    /// is safely on disk.
    pub fn save(&self, project: &mut Project) -> SyncResult<ProjectId> {
        let _guard = SaveGuard::acquire(&self.saving)?;
        validate_project(project)?;

        let now = Utc::now();
        let id = project.id.unwrap_or_default();
        let created_at = project.created_at.unwrap_or(now);
        let manifest = ProjectManifest::describe(project, id, created_at, now);

        let path = self.path_for(&id);
        let temp_path = path.with_extension(format!("{}.tmp", PROJECT_EXTENSION));

        if let Err(e) = write_container(&temp_path, &manifest, project) {
            fs::remove_file(&temp_path).ok();
            return Err(e);
        }
        fs::rename(&temp_path, &path).map_err(|e| {
            SyncError::Storage(format!("Failed to move project into place: {}", e))
        })?;

        project.id = Some(id);
        project.created_at = Some(created_at);
        project.updated_at = Some(now);

        log::info!("Saved project '{}' ({})", project.title, id);
        Ok(id)
    }

    /// Load a project by id
    pub fn load(&self, id: &str) -> SyncResult<Project> {
        let id: ProjectId = id.parse()?;
        let path = self.existing_path(&id)?;
        let project = read_container(&path)?;
        validate_project(&project)?;
        log::debug!("Loaded project {} from {}", id, path.display());
        Ok(project)
    }

    /// Delete a project by id
    pub fn delete(&self, id: &str) -> SyncResult<()> {
        let id: ProjectId = id.parse()?;
        let path = self.existing_path(&id)?;
        fs::remove_file(&path)
            .map_err(|e| SyncError::Storage(format!("Failed to delete project {}: {}", id, e)))?;
        log::info!("Deleted project {}", id);
        Ok(())
    }

    /// Summaries of all readable projects, most recently updated first
    pub fn list(&self) -> SyncResult<Vec<ProjectManifest>> {
        let mut manifests = Vec::new();

        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| {
                SyncError::Storage(format!("Failed to read project directory: {}", e))
            })?;
            let path = entry.path();
            if !path.is_file()
                || path.extension().and_then(|ext| ext.to_str()) != Some(PROJECT_EXTENSION)
            {
                continue;
            }

            match read_manifest(path) {
                Ok(manifest) => manifests.push(manifest),
                Err(e) => log::warn!("Skipping unreadable project {}: {}", path.display(), e),
            }
        }

        manifests.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(manifests)
    }

    fn path_for(&self, id: &ProjectId) -> PathBuf {
        self.root.join(format!("{}.{}", id, PROJECT_EXTENSION))
    }

    fn existing_path(&self, id: &ProjectId) -> SyncResult<PathBuf> {
        let path = self.path_for(id);
        if path.is_file() {
            Ok(path)
        } else {
            Err(SyncError::NotFound(format!("project {}", id)))
        }
    }
}

/// ZIP entry name for a media file; path separators are flattened
fn media_entry(dir: &str, name: &str) -> String {
    let flat: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    if flat.is_empty() {
        format!("{}/{}", dir, dir)
    } else {
        format!("{}/{}", dir, flat)
    }
}

fn entry_options() -> zip::write::SimpleFileOptions {
    zip::write::SimpleFileOptions::default()
}

fn write_container(path: &Path, manifest: &ProjectManifest, project: &Project) -> SyncResult<()> {
    let record = SyncRecord {
        total_bars: project.total_bars,
        audio_duration: project.audio_duration,
        markers: project.markers.clone(),
    };
    let manifest_json = serde_json::to_string_pretty(manifest)?;
    let record_ron = ron::ser::to_string_pretty(&record, ron::ser::PrettyConfig::default())
        .map_err(|e| SyncError::Storage(format!("Failed to serialize sync data: {}", e)))?;

    let file = File::create(path).map_err(|e| {
        SyncError::Storage(format!("Failed to create {}: {}", path.display(), e))
    })?;
    let mut zip_writer = ZipWriter::new(file);

    zip_writer.start_file(MANIFEST_ENTRY, entry_options())?;
    zip_writer.write_all(manifest_json.as_bytes())?;

    zip_writer.start_file(SYNC_ENTRY, entry_options())?;
    zip_writer.write_all(record_ron.as_bytes())?;

    zip_writer.start_file(media_entry(SCORE_DIR, &project.score.name), entry_options())?;
    zip_writer.write_all(&project.score.bytes)?;

    zip_writer.start_file(media_entry(AUDIO_DIR, &project.audio.name), entry_options())?;
    zip_writer.write_all(&project.audio.bytes)?;

    zip_writer.finish()?;
    Ok(())
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> SyncResult<Vec<u8>> {
    let mut entry = archive.by_name(name).map_err(|e| match e {
        zip::result::ZipError::FileNotFound => {
            SyncError::Storage(format!("Project is missing '{}'", name))
        }
        other => SyncError::Zip(other),
    })?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn parse_manifest<R: Read + Seek>(archive: &mut ZipArchive<R>) -> SyncResult<ProjectManifest> {
    let bytes = read_entry(archive, MANIFEST_ENTRY)?;
    let manifest: ProjectManifest = serde_json::from_slice(&bytes)?;
    manifest.version.ensure_supported()?;
    Ok(manifest)
}

fn read_manifest(path: &Path) -> SyncResult<ProjectManifest> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    parse_manifest(&mut archive)
}

fn read_container(path: &Path) -> SyncResult<Project> {
    let mut archive = ZipArchive::new(File::open(path)?)?;
    let manifest = parse_manifest(&mut archive)?;

    let record_bytes = read_entry(&mut archive, SYNC_ENTRY)?;
    let record_text = String::from_utf8(record_bytes)
        .map_err(|e| SyncError::Storage(format!("Sync data is not UTF-8: {}", e)))?;
    let record: SyncRecord = ron::from_str(&record_text)
        .map_err(|e| SyncError::Storage(format!("Failed to parse sync data: {}", e)))?;

    let score = read_entry(&mut archive, &media_entry(SCORE_DIR, &manifest.score_file))?;
    let audio = read_entry(&mut archive, &media_entry(AUDIO_DIR, &manifest.audio_file))?;

    Ok(Project {
        id: Some(manifest.id),
        title: manifest.title,
        artist: manifest.artist,
        score: MediaFile::new(manifest.score_file, score),
        audio: MediaFile::new(manifest.audio_file, audio),
        markers: record.markers,
        total_bars: record.total_bars,
        audio_duration: record.audio_duration,
        created_at: Some(manifest.created_at),
        updated_at: Some(manifest.updated_at),
    })
}
