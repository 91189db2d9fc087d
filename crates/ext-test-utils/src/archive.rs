//! Builders for extension archives on disk.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use ext_runtime::LoaderConfig;
use tempfile::TempDir;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Description of one extension archive.
///
/// # Example
///
/// ```rust,no_run
/// use ext_test_utils::{ExtensionDir, TestArchive};
///
/// let dir = ExtensionDir::new();
/// dir.add(TestArchive::new("audit").depends(&["storage"]).value("limit", "10"));
/// ```
#[derive(Debug, Clone)]
pub struct TestArchive {
    name: String,
    file_name: String,
    main: Option<String>,
    version: Option<String>,
    depends: Vec<String>,
    values: Vec<(String, String)>,
    raw_metadata: Option<String>,
    with_metadata: bool,
    with_entry_symbol: bool,
    entries: Vec<(String, Vec<u8>)>,
}

impl TestArchive {
    /// An archive for extension `name` with entry symbol `<name>.Main`,
    /// version `1.0` and the entry symbol present.
    pub fn new(name: &str) -> Self {
        let slug = name.replace(' ', "_").to_lowercase();
        Self {
            name: name.to_string(),
            file_name: format!("{slug}.ext"),
            main: Some(format!("{slug}.Main")),
            version: Some("1.0".to_string()),
            depends: Vec::new(),
            values: Vec::new(),
            raw_metadata: None,
            with_metadata: true,
            with_entry_symbol: true,
            entries: Vec::new(),
        }
    }

    /// Entry symbol for an extension named `name` built by [`new`](Self::new).
    pub fn default_main(name: &str) -> String {
        format!("{}.Main", name.replace(' ', "_").to_lowercase())
    }

    pub fn file_name(mut self, file_name: &str) -> Self {
        self.file_name = file_name.to_string();
        self
    }

    pub fn main(mut self, symbol: &str) -> Self {
        self.main = Some(symbol.to_string());
        self
    }

    pub fn version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    pub fn depends(mut self, names: &[&str]) -> Self {
        self.depends.extend(names.iter().map(|n| n.to_string()));
        self
    }

    /// Extra metadata key; `yaml` is written verbatim as the value.
    pub fn value(mut self, key: &str, yaml: &str) -> Self {
        self.values.push((key.to_string(), yaml.to_string()));
        self
    }

    pub fn without_main(mut self) -> Self {
        self.main = None;
        self
    }

    pub fn without_version(mut self) -> Self {
        self.version = None;
        self
    }

    /// Leave out the `extension.yml` entry entirely.
    pub fn without_metadata(mut self) -> Self {
        self.with_metadata = false;
        self
    }

    /// Do not write an entry for the entry symbol.
    pub fn without_entry_symbol(mut self) -> Self {
        self.with_entry_symbol = false;
        self
    }

    /// Use `yaml` as the whole metadata document.
    pub fn raw_metadata(mut self, yaml: &str) -> Self {
        self.raw_metadata = Some(yaml.to_string());
        self
    }

    /// Add a symbol entry for a dotted name.
    pub fn symbol(mut self, name: &str, content: &str) -> Self {
        self.entries
            .push((symbol_entry(name), content.as_bytes().to_vec()));
        self
    }

    /// Add an arbitrary entry.
    pub fn entry(mut self, path: &str, bytes: &[u8]) -> Self {
        self.entries.push((path.to_string(), bytes.to_vec()));
        self
    }

    pub fn metadata_yaml(&self) -> String {
        if let Some(raw) = &self.raw_metadata {
            return raw.clone();
        }
        let mut yaml = String::new();
        if let Some(main) = &self.main {
            yaml.push_str(&format!("main: {main}\n"));
        }
        yaml.push_str(&format!("name: '{}'\n", self.name));
        if let Some(version) = &self.version {
            yaml.push_str(&format!("version: '{version}'\n"));
        }
        if !self.depends.is_empty() {
            yaml.push_str("depends:\n");
            for dependency in &self.depends {
                yaml.push_str(&format!("  - '{dependency}'\n"));
            }
        }
        for (key, value) in &self.values {
            yaml.push_str(&format!("{key}: {value}\n"));
        }
        yaml
    }

    /// Write the archive into `dir` and return its path.
    pub fn write_to(&self, dir: &Path) -> PathBuf {
        let path = dir.join(&self.file_name);
        let file = File::create(&path).unwrap();
        let mut writer = ZipWriter::new(file);
        let options = SimpleFileOptions::default();

        if self.with_metadata {
            writer.start_file("extension.yml", options).unwrap();
            writer.write_all(self.metadata_yaml().as_bytes()).unwrap();
        }
        if self.with_entry_symbol
            && let Some(main) = &self.main
        {
            writer.start_file(symbol_entry(main), options).unwrap();
            writer.write_all(main.as_bytes()).unwrap();
        }
        for (entry, bytes) in &self.entries {
            writer.start_file(entry.as_str(), options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap();
        path
    }
}

fn symbol_entry(name: &str) -> String {
    format!("{}.sym", name.replace('.', "/"))
}

/// A temporary extensions directory.
pub struct ExtensionDir {
    temp_dir: TempDir,
}

impl Default for ExtensionDir {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtensionDir {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        std::fs::create_dir(temp_dir.path().join("extensions")).unwrap();
        Self { temp_dir }
    }

    /// Root of the temporary directory.
    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Directory holding the archives.
    pub fn extensions(&self) -> PathBuf {
        self.root().join("extensions")
    }

    /// Directory used as the base for extension homes.
    pub fn homes(&self) -> PathBuf {
        self.root().join("homes")
    }

    pub fn add(&self, archive: TestArchive) -> PathBuf {
        archive.write_to(&self.extensions())
    }

    /// Write a non-archive file into the extensions directory.
    pub fn add_file(&self, name: &str, content: &[u8]) -> PathBuf {
        let path = self.extensions().join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Loader configuration pointing at this directory.
    pub fn config(&self) -> LoaderConfig {
        LoaderConfig::new(self.extensions()).with_home_base(self.homes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_yaml_lists_fields() {
        let yaml = TestArchive::new("Audit Log")
            .depends(&["storage"])
            .value("limit", "10")
            .metadata_yaml();

        assert!(yaml.contains("main: audit_log.Main\n"));
        assert!(yaml.contains("name: 'Audit Log'\n"));
        assert!(yaml.contains("  - 'storage'\n"));
        assert!(yaml.contains("limit: 10\n"));
    }

    #[test]
    fn test_written_archive_holds_entries() {
        let dir = ExtensionDir::new();
        let path = dir.add(TestArchive::new("audit").symbol("acme.Util", "util"));

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["acme/Util.sym", "audit/Main.sym", "extension.yml"]);
        assert!(archive.by_name("extension.yml").is_ok());
    }
}
