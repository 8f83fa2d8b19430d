//! Convenience writer for per-agent time series.
//!
//! Agents that sample one scalar per timestep all share the same row
//! layout; this keeps the table naming and field order consistent across
//! models.

use crate::error::RecordError;
use crate::recorder::Recorder;
use crate::value::Value;

/// Record one sample into the `TimeSeries<name>` table.
pub fn record_time_series(
    recorder: &mut Recorder,
    name: &str,
    agent_id: i32,
    time: i32,
    value: f64,
) -> Result<(), RecordError> {
    let table = format!("TimeSeries{name}");
    recorder
        .new_datum(&table)?
        .add_val("AgentId", Value::Int(agent_id))
        .add_val("Time", Value::Int(time))
        .add_val("Value", Value::Double(value))
        .record()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecBackend;
    use crate::datum::Datum;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct CaptureBackend {
        rows: Rc<RefCell<Vec<(String, Vec<(String, Value)>)>>>,
    }

    impl RecBackend for CaptureBackend {
        fn notify(&mut self, data: &[Datum]) -> Result<(), RecordError> {
            for datum in data {
                let fields =
                    datum.fields().map(|(n, v, _)| (n.to_owned(), v.clone())).collect();
                self.rows.borrow_mut().push((datum.title().to_owned(), fields));
            }
            Ok(())
        }

        fn flush(&mut self) -> Result<(), RecordError> {
            Ok(())
        }

        fn name(&self) -> String {
            "capture".to_owned()
        }
    }

    #[test]
    fn writes_the_expected_row_layout() {
        let rows = Rc::new(RefCell::new(Vec::new()));
        let mut rec = Recorder::new();
        rec.set_dump_count(8);
        rec.register_backend(Box::new(CaptureBackend { rows: Rc::clone(&rows) }));

        record_time_series(&mut rec, "Power", 7, 12, 900.5).unwrap();
        rec.flush().unwrap();

        let rows = rows.borrow();
        assert_eq!(rows.len(), 1);
        let (table, fields) = &rows[0];
        assert_eq!(table, "TimeSeriesPower");
        assert_eq!(fields[1], ("AgentId".to_owned(), Value::Int(7)));
        assert_eq!(fields[2], ("Time".to_owned(), Value::Int(12)));
        assert_eq!(fields[3], ("Value".to_owned(), Value::Double(900.5)));
    }
}
