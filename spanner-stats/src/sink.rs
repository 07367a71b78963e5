use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::StatsError;
use crate::tags::TagMap;
use crate::views::{Aggregation, Measure, View};

/// Where views are registered and measurements end up.
///
/// Recording against a measure with no registered view is a no-op.
pub trait MetricsSink: Send + Sync {
    /// Register all of `views`, or none of them if any conflicts with a registered view.
    fn register(&self, views: &[&'static View]) -> Result<(), StatsError>;
    /// Unregister `views`. Views that are not registered are ignored.
    fn unregister(&self, views: &[&'static View]);
    fn record(&self, tags: &TagMap, measure: &'static Measure, value: i64);
}

/// Registered views, keyed by view name.
#[derive(Default)]
pub struct ViewRegistry {
    views: Mutex<HashMap<&'static str, &'static View>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, views: &[&'static View]) -> Result<(), StatsError> {
        let mut registered = self.views.lock().unwrap_or_else(PoisonError::into_inner);

        for (i, view) in views.iter().enumerate() {
            let existing = registered
                .get(view.name())
                .copied()
                .or_else(|| views[..i].iter().copied().find(|v| v.name() == view.name()));

            if let Some(existing) = existing {
                if existing != *view {
                    return Err(StatsError::Registration {
                        name: view.name().to_owned(),
                    });
                }
            }
        }

        for view in views {
            debug!(view = view.name(), "registering view");
            registered.insert(view.name(), *view);
        }

        Ok(())
    }

    /// Returns the views that were actually removed.
    pub fn unregister(&self, views: &[&'static View]) -> Vec<&'static View> {
        let mut registered = self.views.lock().unwrap_or_else(PoisonError::into_inner);

        views
            .iter()
            .filter_map(|view| registered.remove(view.name()))
            .collect()
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// The registered views aggregating `measure`.
    pub fn views_for(&self, measure: &Measure) -> Vec<&'static View> {
        self.views
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|view| view.measure.name == measure.name)
            .copied()
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionData {
    pub count: u64,
    pub sum: i64,
    pub min: i64,
    pub max: i64,
    /// One more entry than there are bounds; the last one counts values above every bound.
    pub bucket_counts: Vec<u64>,
}

impl DistributionData {
    fn new(bounds: &[f64]) -> Self {
        Self {
            count: 0,
            sum: 0,
            min: i64::MAX,
            max: i64::MIN,
            bucket_counts: vec![0; bounds.len() + 1],
        }
    }

    fn add(&mut self, bounds: &[f64], value: i64) {
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let sample = value as f64;
        let bucket = bounds
            .iter()
            .position(|bound| sample < *bound)
            .unwrap_or(bounds.len());
        self.bucket_counts[bucket] += 1;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AggregationData {
    LastValue(i64),
    Count(u64),
    Distribution(DistributionData),
}

/// One aggregated time series of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub tags: TagMap,
    pub data: AggregationData,
}

/// A sink that aggregates in process memory.
///
/// Rows of a view are dropped when it is unregistered.
#[derive(Default)]
pub struct InMemorySink {
    registry: ViewRegistry,
    rows: Mutex<HashMap<&'static str, HashMap<TagMap, AggregationData>>>,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_registered(&self, view_name: &str) -> bool {
        self.registry.is_registered(view_name)
    }

    /// Rows of `view_name`, ordered by tags.
    pub fn rows(&self, view_name: &str) -> Vec<Row> {
        let rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);

        let mut result: Vec<Row> = rows
            .get(view_name)
            .map(|series| {
                series
                    .iter()
                    .map(|(tags, data)| Row {
                        tags: tags.clone(),
                        data: data.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();
        result.sort_by(|a, b| a.tags.cmp(&b.tags));

        result
    }
}

impl MetricsSink for InMemorySink {
    fn register(&self, views: &[&'static View]) -> Result<(), StatsError> {
        self.registry.register(views)
    }

    fn unregister(&self, views: &[&'static View]) {
        // Lock order is rows, then registry, as in `record`.
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let removed = self.registry.unregister(views);

        for view in removed {
            rows.remove(view.name());
        }
    }

    fn record(&self, tags: &TagMap, measure: &'static Measure, value: i64) {
        let mut rows = self.rows.lock().unwrap_or_else(PoisonError::into_inner);
        let views = self.registry.views_for(measure);

        for view in views {
            let series = rows.entry(view.name()).or_default();
            let data = series
                .entry(tags.project(view.tag_keys))
                .or_insert_with(|| match view.aggregation {
                    Aggregation::LastValue => AggregationData::LastValue(0),
                    Aggregation::Count => AggregationData::Count(0),
                    Aggregation::Distribution(bounds) => {
                        AggregationData::Distribution(DistributionData::new(bounds))
                    }
                });

            match (data, view.aggregation) {
                (AggregationData::LastValue(last), _) => *last = value,
                (AggregationData::Count(count), _) => *count += 1,
                (AggregationData::Distribution(distribution), Aggregation::Distribution(bounds)) => {
                    distribution.add(bounds, value)
                }
                (AggregationData::Distribution(_), _) => {}
            }
        }
    }
}

/// A sink forwarding recordings to the globally installed `metrics` recorder.
///
/// Last-value views become gauges, count views counters and distributions
/// histograms. The view's tag keys become labels.
#[derive(Default)]
pub struct RecorderSink {
    registry: ViewRegistry,
}

impl RecorderSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetricsSink for RecorderSink {
    fn register(&self, views: &[&'static View]) -> Result<(), StatsError> {
        self.registry.register(views)?;

        for view in views {
            let unit: metrics::Unit = view.measure.unit.into();
            match view.aggregation {
                Aggregation::LastValue => {
                    metrics::describe_gauge!(view.name(), unit, view.description())
                }
                Aggregation::Count => {
                    metrics::describe_counter!(view.name(), unit, view.description())
                }
                Aggregation::Distribution(_) => {
                    metrics::describe_histogram!(view.name(), unit, view.description())
                }
            }
        }

        Ok(())
    }

    fn unregister(&self, views: &[&'static View]) {
        self.registry.unregister(views);
    }

    fn record(&self, tags: &TagMap, measure: &'static Measure, value: i64) {
        for view in self.registry.views_for(measure) {
            let labels = tags.labels(view.tag_keys);

            match view.aggregation {
                Aggregation::LastValue => {
                    metrics::gauge!(view.name(), &labels).set(value as f64)
                }
                Aggregation::Count => metrics::counter!(view.name(), &labels).increment(1),
                Aggregation::Distribution(_) => {
                    metrics::histogram!(view.name(), &labels).record(value as f64)
                }
            }
        }
    }
}
