//! Retirement counters and trace sinks.

use std::collections::BTreeMap;

use rv32sim_isa::{InstClass, Instruction};

/// Offered every retired instruction, after its effects are architecturally
/// visible. Implementations must not assume a particular call rate; the
/// loop invokes them synchronously.
pub trait RetireSink: Send {
    fn retired(&mut self, pc: u32, inst: &Instruction);
}

/// The named counters maintained by the run loop itself.
#[derive(Default)]
pub struct Counters {
    retired: u64,
    per_class: BTreeMap<&'static str, u64>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn retire(&mut self, class: InstClass) {
        self.retired += 1;
        *self.per_class.entry(class.counter_name()).or_insert(0) += 1;
    }

    pub fn retired(&self) -> u64 {
        self.retired
    }

    /// Name/value pairs for export, headline counter first.
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut out = vec![("instructions_retired".to_owned(), self.retired)];
        out.extend(
            self.per_class
                .iter()
                .map(|(name, value)| (format!("retired_{name}"), *value)),
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_classes() {
        let mut counters = Counters::new();
        counters.retire(InstClass::Alu);
        counters.retire(InstClass::Alu);
        counters.retire(InstClass::Load);
        assert_eq!(counters.retired(), 3);
        let snapshot = counters.snapshot();
        assert_eq!(
            snapshot[0],
            ("instructions_retired".to_owned(), 3)
        );
        assert!(snapshot.contains(&("retired_alu".to_owned(), 2)));
        assert!(snapshot.contains(&("retired_loads".to_owned(), 1)));
    }
}
