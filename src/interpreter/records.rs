//! loadJsonVars / loadXmlVars: assign one record of a data file as variables

use crate::error::BlockError;
use crate::program::RecordFormat;
use tracing::debug;

use super::Session;

impl Session {
    pub(super) fn exec_load_vars(&mut self, format: RecordFormat, path: &str, selector: &str) -> Result<(), BlockError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(BlockError::assertion(format!("Requires a {} file path or URL", format)));
        }
        let selector = selector.trim();
        let mut reader = self.records.open(format)?;
        let names = reader.load(path)?;
        if reader.eof() {
            return Err(BlockError::assertion(format!("No {} records found in {}", format, path)));
        }
        reader.next(&mut self.vars)?;

        if selector.is_empty() {
            if !reader.eof() {
                return Err(BlockError::assertion(format!(
                    "Multiple {} records are not valid for this command. \
                     (A specific record can be selected by specifying: name=\"value\".)",
                    format
                )));
            }
            debug!(path, fields = names.len(), "loaded record");
            return Ok(());
        }

        while !self.eval_bool(selector)? {
            if reader.eof() {
                return Err(BlockError::assertion(format!(
                    "{} record not found for selector expression: {}; in input file {}",
                    format, selector, path
                )));
            }
            reader.next(&mut self.vars)?;
        }
        debug!(path, selector, fields = names.len(), "loaded selected record");
        Ok(())
    }
}
