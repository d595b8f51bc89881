//! DRAT proof observer.
//!
//! An optional sink receives every clause addition and deletion in the order it affects the
//! solver state. Deletions can be delayed (variable elimination removes clauses that are still
//! referenced by the blocked-clause machinery) and are flushed by `finish_delay`. XOR-derived
//! clauses pass through as their constituent disjunctions.

use std::io::Write;

use gaussat_formula::Lit;

/// DRAT proof writer.
///
/// All methods are no-ops while no sink is attached.
#[derive(Default)]
pub struct Proof {
    sink: Option<Box<dyn Write>>,
    /// Clauses whose deletion is delayed until the next `finish_delay`.
    delayed: Vec<Vec<Lit>>,
}

impl Proof {
    /// Attach a DRAT sink.
    ///
    /// Only clauses added or deleted from this point on are observed, so this is best called
    /// before the first clause is loaded.
    pub fn write_drat(&mut self, sink: Box<dyn Write>) {
        self.sink = Some(sink);
    }

    /// Detach the sink, flushing delayed deletions.
    pub fn close(&mut self) {
        self.finish_delay();
        if let Some(mut sink) = self.sink.take() {
            let _ = sink.flush();
        }
    }

    /// Whether a sink is attached.
    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    /// A clause was added.
    pub fn add_clause(&mut self, lits: &[Lit]) {
        if let Some(sink) = &mut self.sink {
            let _ = write_clause_line(sink, "", lits);
        }
    }

    /// A clause was deleted.
    pub fn delete_clause(&mut self, lits: &[Lit]) {
        if let Some(sink) = &mut self.sink {
            let _ = write_clause_line(sink, "d ", lits);
        }
    }

    /// A clause will be deleted once the current rewrite step is complete.
    pub fn delay_delete(&mut self, lits: &[Lit]) {
        if self.sink.is_some() {
            self.delayed.push(lits.to_vec());
        }
    }

    /// Flush all delayed deletions.
    pub fn finish_delay(&mut self) {
        if let Some(sink) = &mut self.sink {
            for lits in self.delayed.drain(..) {
                let _ = write_clause_line(sink, "d ", &lits);
            }
        } else {
            self.delayed.clear();
        }
    }
}

fn write_clause_line(
    sink: &mut Box<dyn Write>,
    prefix: &str,
    lits: &[Lit],
) -> std::io::Result<()> {
    write!(sink, "{}", prefix)?;
    for &lit in lits {
        write!(sink, "{} ", lit.to_dimacs())?;
    }
    writeln!(sink, "0")
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use gaussat_formula::lits;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn events_in_order() {
        let buf = SharedBuf::default();
        let mut proof = Proof::default();
        proof.write_drat(Box::new(buf.clone()));

        proof.add_clause(&lits![1, 2, 3]);
        proof.delay_delete(&lits![1, 2, 3]);
        proof.add_clause(&lits![1, 2]);
        proof.finish_delay();
        proof.delete_clause(&lits![1, 2]);
        proof.close();

        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "1 2 3 0\n1 2 0\nd 1 2 3 0\nd 1 2 0\n");
    }

    #[test]
    fn inactive_sink_buffers_nothing() {
        let mut proof = Proof::default();
        proof.delay_delete(&lits![1, 2]);
        proof.finish_delay();
        assert!(!proof.is_active());
        assert!(proof.delayed.is_empty());
    }
}
