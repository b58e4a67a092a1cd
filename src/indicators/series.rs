// =============================================================================
// Bar-aligned series
// =============================================================================
//
// Every derived indicator series is shorter than the closes it was computed
// from (MACD drops a warm-up, RSI consumes its look-back window).  Instead of
// relying on positional coincidence, each series records the bar index of its
// first value.  Bar indices always refer to positions in the `PriceSeries`
// the pipeline started from.
// =============================================================================

use serde::Serialize;

/// Ordered closing prices, one per candle, oldest first.
///
/// A `PriceSeries` defines the bar index space: bar `i` is `closes[i]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceSeries {
    closes: Vec<f64>,
}

impl PriceSeries {
    pub fn new(closes: Vec<f64>) -> Self {
        Self { closes }
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    /// Close price at absolute bar index `bar`.
    pub fn close_at(&self, bar: usize) -> Option<f64> {
        self.closes.get(bar).copied()
    }

    /// Most recent close.
    pub fn last(&self) -> Option<f64> {
        self.closes.last().copied()
    }

    /// View the closes as an aligned series starting at bar 0.
    pub fn to_aligned(&self) -> AlignedSeries {
        AlignedSeries::new(0, self.closes.clone())
    }
}

impl From<Vec<f64>> for PriceSeries {
    fn from(closes: Vec<f64>) -> Self {
        Self::new(closes)
    }
}

/// A series of values where `values[j]` belongs to bar `start + j`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedSeries {
    start: usize,
    values: Vec<f64>,
}

impl AlignedSeries {
    pub fn new(start: usize, values: Vec<f64>) -> Self {
        Self { start, values }
    }

    /// Bar index of the first value.
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the bar index of the last value.
    pub fn end(&self) -> usize {
        self.start + self.values.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at absolute bar index `bar`, if this series covers it.
    pub fn at_bar(&self, bar: usize) -> Option<f64> {
        bar.checked_sub(self.start)
            .and_then(|j| self.values.get(j).copied())
    }

    /// Iterate `(bar, value)` pairs in bar order.
    pub fn bars(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(j, &v)| (self.start + j, v))
    }

    /// Element-wise `self - other` over the bars both series cover.
    pub fn minus(&self, other: &AlignedSeries) -> AlignedSeries {
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        let values = (start..end)
            .filter_map(|bar| Some(self.at_bar(bar)? - other.at_bar(bar)?))
            .collect();
        AlignedSeries::new(start, values)
    }

    /// Drop values before bar `bar`.  Returns an empty series starting at
    /// `bar` when the series ends earlier.
    pub fn from_bar(&self, bar: usize) -> AlignedSeries {
        let skip = bar.saturating_sub(self.start).min(self.values.len());
        AlignedSeries::new(self.start.max(bar), self.values[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_bar_respects_offset() {
        let s = AlignedSeries::new(3, vec![1.0, 2.0, 3.0]);
        assert_eq!(s.at_bar(2), None);
        assert_eq!(s.at_bar(3), Some(1.0));
        assert_eq!(s.at_bar(5), Some(3.0));
        assert_eq!(s.at_bar(6), None);
        assert_eq!(s.end(), 6);
    }

    #[test]
    fn minus_intersects_bar_ranges() {
        let a = AlignedSeries::new(0, vec![10.0, 20.0, 30.0, 40.0]);
        let b = AlignedSeries::new(2, vec![1.0, 2.0, 3.0]);
        let d = a.minus(&b);
        assert_eq!(d.start(), 2);
        assert_eq!(d.values(), &[29.0, 38.0]);
    }

    #[test]
    fn from_bar_drops_warm_up() {
        let s = AlignedSeries::new(0, vec![1.0, 2.0, 3.0, 4.0]);
        let tail = s.from_bar(3);
        assert_eq!(tail.start(), 3);
        assert_eq!(tail.values(), &[4.0]);

        let past_end = s.from_bar(10);
        assert!(past_end.is_empty());
        assert_eq!(past_end.start(), 10);
    }

    #[test]
    fn bars_yield_absolute_indices() {
        let s = AlignedSeries::new(26, vec![-1.0, 0.5]);
        let bars: Vec<_> = s.bars().collect();
        assert_eq!(bars, vec![(26, -1.0), (27, 0.5)]);
    }

    #[test]
    fn price_series_lookup() {
        let p = PriceSeries::from(vec![5.0, 6.0, 7.0]);
        assert_eq!(p.close_at(1), Some(6.0));
        assert_eq!(p.close_at(3), None);
        assert_eq!(p.last(), Some(7.0));
        assert_eq!(p.to_aligned().start(), 0);
    }
}
