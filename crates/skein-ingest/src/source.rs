//! [`JsonlSource`]: line-delimited stream JSON from a file or stdin.

use std::path::Path;

use skein_core::{post::Post, source::EventSource};
use skein_wire::StreamMessage;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, BufReader};
use tracing::{debug, info, warn};

use crate::error::SourceError;

/// Path that selects standard input.
pub const STDIN: &str = "-";

/// Reads one stream message per line and yields only the posts.
///
/// Delete and limit notices are logged and skipped. Blank lines are
/// ignored. A line that fails to decode, including one that is not valid
/// UTF-8, either ends the stream with [`SourceError::Decode`] or is skipped,
/// depending on `skip_malformed`. Only read failures surface as
/// [`SourceError::Io`].
pub struct JsonlSource {
  name:           String,
  reader:         Box<dyn AsyncBufRead + Unpin + Send>,
  buf:            Vec<u8>,
  line:           u64,
  skip_malformed: bool,
  malformed:      u64,
  notices:        u64,
}

impl JsonlSource {
  pub fn new(
    name: impl Into<String>,
    reader: impl AsyncBufRead + Unpin + Send + 'static,
    skip_malformed: bool,
  ) -> Self {
    Self {
      name: name.into(),
      reader: Box::new(reader),
      buf: Vec::new(),
      line: 0,
      skip_malformed,
      malformed: 0,
      notices: 0,
    }
  }

  /// Open `path`, or stdin when it is [`STDIN`].
  pub async fn open(path: &Path, skip_malformed: bool) -> std::io::Result<Self> {
    if path == Path::new(STDIN) {
      return Ok(Self::new("stdin", BufReader::new(tokio::io::stdin()), skip_malformed));
    }
    let file = tokio::fs::File::open(path).await?;
    Ok(Self::new(path.display().to_string(), BufReader::new(file), skip_malformed))
  }

  /// Lines skipped as malformed so far.
  pub fn malformed(&self) -> u64 { self.malformed }

  /// Delete, limit and other control messages skipped so far.
  pub fn notices(&self) -> u64 { self.notices }
}

impl EventSource for JsonlSource {
  type Error = SourceError;

  fn name(&self) -> &str { &self.name }

  async fn next(&mut self) -> Result<Option<Post>, SourceError> {
    loop {
      self.buf.clear();
      if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
        break;
      }
      self.line += 1;

      let line = self.buf.trim_ascii();
      if line.is_empty() {
        continue;
      }

      match skein_wire::decode_bytes(line) {
        Ok(StreamMessage::Post(post)) => return Ok(Some(post)),
        Ok(StreamMessage::Delete { post, author }) => {
          self.notices += 1;
          debug!(%post, ?author, "delete notice");
        }
        Ok(StreamMessage::Limit { undelivered }) => {
          self.notices += 1;
          info!(undelivered, "provider withheld matching posts");
        }
        Ok(StreamMessage::Other { kind }) => {
          self.notices += 1;
          debug!(%kind, "ignoring control message");
        }
        Err(e) if self.skip_malformed => {
          self.malformed += 1;
          warn!(source = %self.name, line = self.line, error = %e, "skipping malformed line");
        }
        Err(e) => return Err(SourceError::Decode { line: self.line, source: e }),
      }
    }

    info!(
      source = %self.name,
      lines = self.line,
      malformed = self.malformed,
      notices = self.notices,
      "end of stream"
    );
    Ok(None)
  }
}
