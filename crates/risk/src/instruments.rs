use crate::error::RiskError;
use configuration::InstrumentSpec;
use core_types::base_code;
use std::collections::HashMap;

/// The contract specification table, keyed by base code.
#[derive(Debug, Clone, Default)]
pub struct InstrumentTable {
    specs: HashMap<String, InstrumentSpec>,
}

impl InstrumentTable {
    pub fn new(specs: impl IntoIterator<Item = InstrumentSpec>) -> Self {
        Self {
            specs: specs
                .into_iter()
                .map(|spec| (spec.code.clone(), spec))
                .collect(),
        }
    }

    /// Looks up a concrete contract by its base code (`SHFE.rb2510` -> `SHFE.rb`).
    pub fn lookup(&self, symbol: &str) -> Result<&InstrumentSpec, RiskError> {
        let code = base_code(symbol)?;
        self.specs
            .get(&code)
            .ok_or(RiskError::UnknownInstrument(code))
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
