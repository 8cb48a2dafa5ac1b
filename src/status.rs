use chrono::{DateTime, Utc};

/// Ordinal health status of an instance. Higher is worse; `Info` sits below
/// `Ok` so that worst-case rollups never promote informational instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    TechnicalIssue = -2,
    Info = -1,
    Ok = 0,
    Warning = 1,
    Critical = 2,
}

impl Severity {
    pub fn code(self) -> i64 {
        self as i64
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -2 => Some(Severity::TechnicalIssue),
            -1 => Some(Severity::Info),
            0 => Some(Severity::Ok),
            1 => Some(Severity::Warning),
            2 => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::TechnicalIssue => "technical issue",
            Severity::Info => "info",
            Severity::Ok => "ok",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One persisted point-in-time status value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub time: DateTime<Utc>,
    pub instance: String,
    pub category: String,
    pub status: Severity,
}

impl StatusRecord {
    pub fn synthetic(time: DateTime<Utc>, instance: &str, category: &str, status: Severity) -> Self {
        Self {
            time,
            instance: instance.to_string(),
            category: category.to_string(),
            status,
        }
    }
}

/// A resolved status lookup: either real rows from the store (ascending by
/// time) or a single synthetic record standing in for "info" and "no data"
/// results. Both variants answer `latest()` uniformly.
#[derive(Debug, Clone)]
pub enum StatusSeries {
    Recorded(Vec<StatusRecord>),
    Synthetic(StatusRecord),
}

impl StatusSeries {
    /// The most recent record in the series. `Recorded` is never constructed
    /// empty; the resolver substitutes a `Synthetic` fallback instead.
    pub fn latest(&self) -> &StatusRecord {
        match self {
            StatusSeries::Recorded(records) => records
                .last()
                .expect("Recorded series is never constructed empty"),
            StatusSeries::Synthetic(record) => record,
        }
    }

    pub fn records(&self) -> &[StatusRecord] {
        match self {
            StatusSeries::Recorded(records) => records.as_slice(),
            StatusSeries::Synthetic(record) => std::slice::from_ref(record),
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, StatusSeries::Synthetic(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn severity_orders_by_numeric_code() {
        assert!(Severity::TechnicalIssue < Severity::Info);
        assert!(Severity::Info < Severity::Ok);
        assert!(Severity::Ok < Severity::Warning);
        assert!(Severity::Warning < Severity::Critical);
    }

    #[test]
    fn severity_code_round_trips() {
        for code in -2..=2 {
            let severity = Severity::from_code(code).expect("valid code");
            assert_eq!(severity.code(), code);
        }
        assert_eq!(Severity::from_code(3), None);
        assert_eq!(Severity::from_code(-3), None);
    }

    #[test]
    fn series_latest_is_uniform_across_variants() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 25, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2026, 8, 25, 10, 15, 0).unwrap();

        let recorded = StatusSeries::Recorded(vec![
            StatusRecord::synthetic(t0, "a", "Batch", Severity::Ok),
            StatusRecord::synthetic(t1, "a", "Batch", Severity::Warning),
        ]);
        assert_eq!(recorded.latest().status, Severity::Warning);
        assert_eq!(recorded.latest().time, t1);
        assert_eq!(recorded.len(), 2);

        let synthetic =
            StatusSeries::Synthetic(StatusRecord::synthetic(t0, "b", "Batch", Severity::Info));
        assert_eq!(synthetic.latest().status, Severity::Info);
        assert_eq!(synthetic.len(), 1);
        assert!(synthetic.is_synthetic());
    }
}
