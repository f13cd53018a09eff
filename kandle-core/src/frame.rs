use polars::prelude::*;

use crate::FcpError;
use crate::schema::DATA_SOURCE;

/// The frame handed back to callers, plus the metadata flags the wire
/// contract requires.
///
/// A non-empty frame is a success regardless of partial-ness; the flags carry
/// the caveat instead of an exception discarding good data.
#[derive(Debug, Clone)]
pub struct MarketFrame {
    /// Ordered, deduplicated candle rows with the canonical columns and the
    /// `_data_source` provenance column.
    pub frame: DataFrame,
    /// True when a rate-limit signal cut the REST stage short.
    pub rate_limited: bool,
    /// True when at least one requested sub-range could not be filled.
    pub fcp_partial: bool,
}

impl MarketFrame {
    /// Wrap a frame with both flags clear.
    #[must_use]
    pub const fn new(frame: DataFrame) -> Self {
        Self {
            frame,
            rate_limited: false,
            fcp_partial: false,
        }
    }

    /// Number of candle rows.
    #[must_use]
    pub fn records(&self) -> usize {
        self.frame.height()
    }

    /// Whether the frame has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Row counts per provenance tag, descending.
    ///
    /// # Errors
    /// Returns `FcpError::Data` when the provenance column is missing.
    pub fn source_distribution(&self) -> Result<Vec<(String, usize)>, FcpError> {
        let col = self.frame.column(DATA_SOURCE)?;
        let tags = col.str()?;
        let mut counts: Vec<(String, usize)> = Vec::new();
        for tag in tags.into_iter().flatten() {
            match counts.iter_mut().find(|(name, _)| name == tag) {
                Some((_, n)) => *n += 1,
                None => counts.push((tag.to_string(), 1)),
            }
        }
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(counts)
    }

    /// Drop the provenance column for callers that do not want it.
    ///
    /// # Errors
    /// Returns `FcpError::Data` when the column is absent.
    pub fn without_provenance(mut self) -> Result<Self, FcpError> {
        self.frame = self.frame.drop(DATA_SOURCE)?;
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::OPEN_TIME;

    #[test]
    fn source_distribution_counts_tags() {
        let df = df!(
            OPEN_TIME => [1i64, 2, 3],
            "close" => [1.0f64, 2.0, 3.0],
            DATA_SOURCE => ["CACHE", "CACHE", "REST"],
        )
        .unwrap();
        let mf = MarketFrame::new(df);
        let dist = mf.source_distribution().unwrap();
        assert_eq!(dist[0], ("CACHE".to_string(), 2));
        assert_eq!(dist[1], ("REST".to_string(), 1));
    }

    #[test]
    fn without_provenance_drops_the_tag_column() {
        let df = df!(
            OPEN_TIME => [1i64],
            DATA_SOURCE => ["REST"],
        )
        .unwrap();
        let mf = MarketFrame::new(df).without_provenance().unwrap();
        assert!(!mf.frame.get_column_names_str().contains(&DATA_SOURCE));
    }
}
