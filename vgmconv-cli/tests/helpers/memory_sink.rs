//! In-memory output sink
//!
//! Clones share storage, so a test keeps one clone and hands the other to
//! the converter.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use vgmconv_cli::convert::OutputSink;

#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    files: Arc<Mutex<BTreeMap<String, SharedBuffer>>>,
    stdout: SharedBuffer,
    info: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of created files, sorted
    pub fn file_names(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    /// Contents of a created file
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(name).map(|b| b.contents())
    }

    pub fn stdout_bytes(&self) -> Vec<u8> {
        self.stdout.contents()
    }

    pub fn info(&self) -> Vec<String> {
        self.info.lock().unwrap().clone()
    }
}

impl OutputSink for MemorySink {
    fn create_file(&mut self, name: &str) -> io::Result<Box<dyn Write>> {
        let buffer = SharedBuffer::default();
        self.files
            .lock()
            .unwrap()
            .insert(name.to_string(), buffer.clone());
        Ok(Box::new(buffer))
    }

    fn stdout(&mut self) -> Box<dyn Write> {
        Box::new(self.stdout.clone())
    }

    fn print_info(&mut self, text: &str) {
        self.info.lock().unwrap().push(text.to_string());
    }
}

#[derive(Debug, Default, Clone)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
