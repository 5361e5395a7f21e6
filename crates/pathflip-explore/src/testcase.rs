//! Test-case export.
//!
//! A test case is the ordered list of values the program consumed from its
//! nondet calls. [`DirectoryExporter`] writes them in the Test-Comp XML
//! format, one `testcase-<n>.xml` per test plus a `metadata.xml`.
//! [`TestCaseWriter`] enforces the cap on the number of test cases.

use crate::coverage::CoverageCriterion;
use crate::error::ExploreError;
use log::debug;
use pathflip_program::Value;
use snafu::Snafu;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Default cap on written test cases.
pub const DEFAULT_MAX_TEST_CASES: usize = 99_000;

/// Errors from test-case exporters.
#[derive(Debug, Snafu)]
pub enum ExportError {
    #[snafu(display("I/O error"), context(false))]
    Io { source: std::io::Error },
}

/// Persists test cases.
pub trait TestCaseExporter {
    fn write_test_case(&mut self, inputs: &[String]) -> Result<(), ExportError>;
}

/// Information written to `metadata.xml`.
#[derive(Debug, Clone)]
pub struct TestMetadata {
    pub program_name: String,
    pub entry_function: String,
    pub error_function: String,
    pub criterion: CoverageCriterion,
}

impl TestMetadata {
    fn specification(&self) -> String {
        match self.criterion {
            CoverageCriterion::Branch => {
                "COVER( init(main()), FQL(COVER EDGES(@DECISIONEDGE)) )".to_string()
            }
            CoverageCriterion::Error => format!(
                "COVER( init(main()), FQL(COVER EDGES(@CALL({}))) )",
                self.error_function
            ),
        }
    }

    fn to_xml(&self) -> String {
        let mut out = String::new();
        out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
        out.push_str(
            "<!DOCTYPE test-metadata PUBLIC \"+//IDN sosy-lab.org//DTD test-format test-metadata 1.1//EN\" \
             \"https://sosy-lab.org/test-format/test-metadata-1.1.dtd\">\n",
        );
        out.push_str("<test-metadata>\n");
        out.push_str("  <sourcecodelang>C</sourcecodelang>\n");
        out.push_str(&format!("  <producer>pathflip {}</producer>\n", env!("CARGO_PKG_VERSION")));
        out.push_str(&format!(
            "  <specification>{}</specification>\n",
            escape(&self.specification())
        ));
        out.push_str(&format!(
            "  <programfile>{}</programfile>\n",
            escape(&self.program_name)
        ));
        out.push_str(&format!(
            "  <entryfunction>{}</entryfunction>\n",
            escape(&self.entry_function)
        ));
        out.push_str("  <architecture>32bit</architecture>\n");
        out.push_str("</test-metadata>\n");
        out
    }
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Render one test case as Test-Comp XML.
pub fn testcase_xml(inputs: &[String]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"no\"?>\n");
    out.push_str(
        "<!DOCTYPE testcase PUBLIC \"+//IDN sosy-lab.org//DTD test-format testcase 1.1//EN\" \
         \"https://sosy-lab.org/test-format/testcase-1.1.dtd\">\n",
    );
    out.push_str("<testcase>\n");
    for input in inputs {
        out.push_str(&format!("  <input>{}</input>\n", escape(input)));
    }
    out.push_str("</testcase>\n");
    out
}

/// Writes Test-Comp XML files into a directory.
pub struct DirectoryExporter {
    dir: PathBuf,
    next: usize,
}

impl DirectoryExporter {
    /// Create `dir` if needed and write `metadata.xml` into it.
    pub fn create<P: AsRef<Path>>(dir: P, metadata: &TestMetadata) -> Result<Self, ExportError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("metadata.xml"), metadata.to_xml())?;
        Ok(Self { dir, next: 1 })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl TestCaseExporter for DirectoryExporter {
    fn write_test_case(&mut self, inputs: &[String]) -> Result<(), ExportError> {
        let path = self.dir.join(format!("testcase-{}.xml", self.next));
        fs::write(&path, testcase_xml(inputs))?;
        debug!("Wrote {}", path.display());
        self.next += 1;
        Ok(())
    }
}

/// Keeps test cases in memory. Clones share storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryExporter {
    cases: Arc<Mutex<Vec<Vec<String>>>>,
}

impl MemoryExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn test_cases(&self) -> Vec<Vec<String>> {
        self.cases.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.cases.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TestCaseExporter for MemoryExporter {
    fn write_test_case(&mut self, inputs: &[String]) -> Result<(), ExportError> {
        self.cases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(inputs.to_vec());
        Ok(())
    }
}

/// Exporter front end that counts writes and enforces the cap.
pub struct TestCaseWriter {
    exporter: Box<dyn TestCaseExporter>,
    max_test_cases: usize,
    written: usize,
}

impl TestCaseWriter {
    pub fn new(exporter: Box<dyn TestCaseExporter>, max_test_cases: usize) -> Self {
        Self {
            exporter,
            max_test_cases,
            written: 0,
        }
    }

    /// Export one value history.
    ///
    /// Once more than `max_test_cases` tests were written, every further
    /// write fails with [`ExploreError::TestCaseLimit`].
    pub fn write(&mut self, history: &[Value]) -> Result<(), ExploreError> {
        if self.written > self.max_test_cases {
            return Err(ExploreError::TestCaseLimit(self.max_test_cases));
        }
        let inputs: Vec<String> = history.iter().map(|v| v.to_string()).collect();
        self.exporter.write_test_case(&inputs)?;
        self.written += 1;
        debug!("Test case {} written ({} inputs)", self.written, inputs.len());
        Ok(())
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metadata() -> TestMetadata {
        TestMetadata {
            program_name: "loop.c".to_string(),
            entry_function: "main".to_string(),
            error_function: "reach_error".to_string(),
            criterion: CoverageCriterion::Error,
        }
    }

    #[test]
    fn test_testcase_xml() {
        let xml = testcase_xml(&["5".to_string(), "-1".to_string()]);
        assert!(xml.contains("<testcase>"));
        assert!(xml.contains("  <input>5</input>\n  <input>-1</input>\n"));
    }

    #[test]
    fn test_metadata_names_error_function() {
        let xml = metadata().to_xml();
        assert!(xml.contains("@CALL(reach_error)"));
        assert!(xml.contains("<programfile>loop.c</programfile>"));
    }

    #[test]
    fn test_directory_exporter_numbers_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut exporter = DirectoryExporter::create(dir.path(), &metadata()).unwrap();
        exporter.write_test_case(&["1".to_string()]).unwrap();
        exporter.write_test_case(&["2".to_string()]).unwrap();

        assert!(dir.path().join("metadata.xml").exists());
        let second = fs::read_to_string(dir.path().join("testcase-2.xml")).unwrap();
        assert!(second.contains("<input>2</input>"));
    }

    #[test]
    fn test_memory_exporter_shares_storage() {
        let exporter = MemoryExporter::new();
        let mut writer = TestCaseWriter::new(Box::new(exporter.clone()), 10);
        writer.write(&[Value(3), Value(-4)]).unwrap();
        assert_eq!(exporter.test_cases(), vec![vec!["3".to_string(), "-4".to_string()]]);
        assert_eq!(writer.written(), 1);
    }

    #[test]
    fn test_cap_enforced_after_limit_plus_one() {
        let exporter = MemoryExporter::new();
        let mut writer = TestCaseWriter::new(Box::new(exporter.clone()), 2);
        for _ in 0..3 {
            writer.write(&[Value(0)]).unwrap();
        }
        assert!(matches!(
            writer.write(&[Value(0)]),
            Err(ExploreError::TestCaseLimit(2))
        ));
        assert_eq!(exporter.len(), 3);
    }
}
