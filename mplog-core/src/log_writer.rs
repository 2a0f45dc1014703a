use std::{
    fs::{self, File},
    io::{self, BufWriter, IsTerminal, Write},
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

/// Destination of already rendered and encoded lines.
pub trait LogWriter: Send {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// Flushes and releases the destination.
    fn close(&mut self) -> io::Result<()> {
        self.flush()
    }
}

impl<W: LogWriter + ?Sized> LogWriter for Box<W> {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        (**self).write_line(line)
    }

    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }

    fn close(&mut self) -> io::Result<()> {
        (**self).close()
    }
}

/// Appends lines to a file that is only created on the first write.
pub struct LogFile {
    path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl LogFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn open(&mut self) -> io::Result<&mut BufWriter<File>> {
        let file = match self.file.take() {
            Some(file) => file,
            None => {
                if let Some(parent) = self.path.parent()
                    && !parent.as_os_str().is_empty()
                {
                    fs::create_dir_all(parent)?;
                }
                let file = File::options().create(true).append(true).open(&self.path)?;
                BufWriter::new(file)
            }
        };
        Ok(self.file.insert(file))
    }
}

impl LogWriter for LogFile {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        let file = self.open()?;
        file.write_all(line)?;
        file.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.as_mut() {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> io::Result<()> {
        match self.file.take() {
            Some(mut file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Standard stream or in-memory buffer used by console sinks.
#[derive(Debug, Clone, Default)]
pub enum ConsoleTarget {
    #[default]
    Stderr,
    Stdout,
    Buffer(SharedBuffer),
}

impl ConsoleTarget {
    pub fn is_terminal(&self) -> bool {
        match self {
            ConsoleTarget::Stderr => io::stderr().is_terminal(),
            ConsoleTarget::Stdout => io::stdout().is_terminal(),
            ConsoleTarget::Buffer(_) => false,
        }
    }
}

#[derive(Debug, Default)]
pub struct LogConsole {
    target: ConsoleTarget,
}

impl LogConsole {
    pub fn new(target: ConsoleTarget) -> Self {
        Self { target }
    }
}

impl LogWriter for LogConsole {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        match &mut self.target {
            ConsoleTarget::Stderr => write_locked(&mut io::stderr().lock(), line),
            ConsoleTarget::Stdout => write_locked(&mut io::stdout().lock(), line),
            ConsoleTarget::Buffer(buffer) => buffer.write_line(line),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.target {
            ConsoleTarget::Stderr => io::stderr().flush(),
            ConsoleTarget::Stdout => io::stdout().flush(),
            ConsoleTarget::Buffer(buffer) => buffer.flush(),
        }
    }
}

fn write_locked<W: Write>(stream: &mut W, line: &[u8]) -> io::Result<()> {
    stream.write_all(line)?;
    stream.write_all(b"\n")?;
    stream.flush()
}

/// Cloneable in-memory destination; every clone sees the same bytes.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    fn bytes(&self) -> MutexGuard<'_, Vec<u8>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(String::from).collect()
    }
}

impl LogWriter for SharedBuffer {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        let mut bytes = self.bytes();
        bytes.extend_from_slice(line);
        bytes.push(b'\n');
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Adapts any `Write` stream.
pub struct LogStream<W>(pub W);

impl<W: Write + Send> LogWriter for LogStream<W> {
    fn write_line(&mut self, line: &[u8]) -> io::Result<()> {
        self.0.write_all(line)?;
        self.0.write_all(b"\n")
    }

    fn flush(&mut self) -> io::Result<()> {
        self.0.flush()
    }
}
