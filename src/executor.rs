//! Execution seam between the loader and a database driver.
//!
//! The loader never talks to a driver directly; it consumes the
//! [`QueryExecutor`] and [`ResultStream`] traits, which a driver adapter
//! implements. The [`fixture`] module provides a scripted in-memory
//! implementation used by the crate's own tests and available to
//! downstream test suites.

use async_trait::async_trait;

use crate::error::LoadError;

/// Cursor over the result sets of one executed command.
///
/// The stream starts positioned before the first result set; callers
/// alternate [`advance_result`](ResultStream::advance_result) and
/// [`advance_row`](ResultStream::advance_row) and read cells from the
/// current row by ordinal.
#[async_trait]
pub trait ResultStream: Send {
    /// Moves to the next result set. Returns false when exhausted.
    ///
    /// # Errors
    /// Driver-level failures surface as [`LoadError`].
    async fn advance_result(&mut self) -> Result<bool, LoadError>;

    /// Moves to the next row of the current result set. Returns false at
    /// the end of the set.
    ///
    /// # Errors
    /// Driver-level failures surface as [`LoadError`].
    async fn advance_row(&mut self) -> Result<bool, LoadError>;

    /// Reads a 32-bit integer cell.
    ///
    /// # Errors
    /// Fails when the cell is absent, null, or not an `i32`.
    fn get_i32(&self, ordinal: usize) -> Result<i32, LoadError>;

    /// Reads a 16-bit integer cell.
    ///
    /// # Errors
    /// Fails when the cell is absent, null, or not an `i16`.
    fn get_i16(&self, ordinal: usize) -> Result<i16, LoadError>;

    /// Reads an unsigned byte cell.
    ///
    /// # Errors
    /// Fails when the cell is absent, null, or not a `u8`.
    fn get_u8(&self, ordinal: usize) -> Result<u8, LoadError>;

    /// Reads a boolean cell.
    ///
    /// # Errors
    /// Fails when the cell is absent, null, or not a boolean.
    fn get_bool(&self, ordinal: usize) -> Result<bool, LoadError>;

    /// Reads a string cell.
    ///
    /// # Errors
    /// Fails when the cell is absent, null, or not textual.
    fn get_string(&self, ordinal: usize) -> Result<String, LoadError>;

    /// True when the cell is null or absent.
    fn is_null(&self, ordinal: usize) -> bool;
}

/// Driver adapter capable of running commands against a connection.
///
/// The connection identity is an opaque string owned by the caller; it is
/// redacted before appearing in diagnostics.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Reports the server's version string for the given connection.
    ///
    /// # Errors
    /// [`LoadError::ConnectionFailed`] when the server is unreachable.
    async fn server_version(&self, connection: &str) -> Result<String, LoadError>;

    /// Executes a command and returns a cursor over its result sets.
    ///
    /// # Errors
    /// [`LoadError::ConnectionFailed`] when the server is unreachable or
    /// the command fails.
    async fn execute(
        &self,
        connection: &str,
        command: &str,
    ) -> Result<Box<dyn ResultStream>, LoadError>;
}

pub mod fixture {
    //! Scripted in-memory executor for tests.

    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::error::LoadError;
    use crate::value::Value;

    use super::{QueryExecutor, ResultStream};

    /// One scripted result set: rows of cells.
    pub type FixtureResultSet = Vec<Vec<Value>>;

    /// A [`QueryExecutor`] that replays scripted result sets.
    ///
    /// Every `execute` call replays the same script and bumps an
    /// execution counter, which concurrency tests use to assert that
    /// simultaneous loads collapsed into one execution. An optional
    /// delay widens the race window for those tests.
    pub struct FixtureExecutor {
        version: String,
        results: Vec<FixtureResultSet>,
        delay: Option<Duration>,
        executions: AtomicUsize,
    }

    impl FixtureExecutor {
        /// Creates a fixture replaying the given result sets.
        #[must_use]
        pub fn new(version: impl Into<String>, results: Vec<FixtureResultSet>) -> Self {
            Self {
                version: version.into(),
                results,
                delay: None,
                executions: AtomicUsize::new(0),
            }
        }

        /// Delays every `execute` call by the given duration.
        #[must_use]
        pub const fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Number of `execute` calls observed so far.
        #[must_use]
        pub fn execution_count(&self) -> usize {
            self.executions.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl QueryExecutor for FixtureExecutor {
        async fn server_version(&self, _connection: &str) -> Result<String, LoadError> {
            Ok(self.version.clone())
        }

        async fn execute(
            &self,
            _connection: &str,
            _command: &str,
        ) -> Result<Box<dyn ResultStream>, LoadError> {
            self.executions.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(Box::new(FixtureStream {
                results: self.results.clone(),
                result_pos: None,
                row_pos: None,
            }))
        }
    }

    struct FixtureStream {
        results: Vec<FixtureResultSet>,
        result_pos: Option<usize>,
        row_pos: Option<usize>,
    }

    impl FixtureStream {
        fn cell(&self, ordinal: usize) -> Result<&Value, LoadError> {
            let result = self
                .result_pos
                .and_then(|r| self.results.get(r))
                .ok_or_else(|| LoadError::unknown("no current result set"))?;
            let row = self
                .row_pos
                .and_then(|r| result.get(r))
                .ok_or_else(|| LoadError::unknown("no current row"))?;
            row.get(ordinal)
                .ok_or_else(|| LoadError::unknown(format!("no cell at ordinal {ordinal}")))
        }
    }

    #[async_trait]
    impl ResultStream for FixtureStream {
        async fn advance_result(&mut self) -> Result<bool, LoadError> {
            let next = self.result_pos.map_or(0, |r| r + 1);
            self.row_pos = None;
            if next < self.results.len() {
                self.result_pos = Some(next);
                Ok(true)
            } else {
                self.result_pos = Some(self.results.len());
                Ok(false)
            }
        }

        async fn advance_row(&mut self) -> Result<bool, LoadError> {
            let Some(result) = self.result_pos.and_then(|r| self.results.get(r)) else {
                return Ok(false);
            };
            let next = self.row_pos.map_or(0, |r| r + 1);
            if next < result.len() {
                self.row_pos = Some(next);
                Ok(true)
            } else {
                self.row_pos = Some(result.len());
                Ok(false)
            }
        }

        fn get_i32(&self, ordinal: usize) -> Result<i32, LoadError> {
            match self.cell(ordinal)? {
                Value::Int32(v) => Ok(*v),
                other => Err(LoadError::unknown(format!(
                    "cell {ordinal} is not an i32: {other:?}"
                ))),
            }
        }

        fn get_i16(&self, ordinal: usize) -> Result<i16, LoadError> {
            match self.cell(ordinal)? {
                Value::Int16(v) => Ok(*v),
                other => Err(LoadError::unknown(format!(
                    "cell {ordinal} is not an i16: {other:?}"
                ))),
            }
        }

        fn get_u8(&self, ordinal: usize) -> Result<u8, LoadError> {
            match self.cell(ordinal)? {
                Value::UInt8(v) => Ok(*v),
                other => Err(LoadError::unknown(format!(
                    "cell {ordinal} is not a u8: {other:?}"
                ))),
            }
        }

        fn get_bool(&self, ordinal: usize) -> Result<bool, LoadError> {
            match self.cell(ordinal)? {
                Value::Bool(v) => Ok(*v),
                other => Err(LoadError::unknown(format!(
                    "cell {ordinal} is not a bool: {other:?}"
                ))),
            }
        }

        fn get_string(&self, ordinal: usize) -> Result<String, LoadError> {
            match self.cell(ordinal)? {
                Value::Text(s) => Ok(s.clone()),
                other => Err(LoadError::unknown(format!(
                    "cell {ordinal} is not text: {other:?}"
                ))),
            }
        }

        fn is_null(&self, ordinal: usize) -> bool {
            self.cell(ordinal).map_or(true, Value::is_null)
        }
    }

}
