//! Raw mock input and its canonical stored form
//!
//! Whatever a caller registers (a callback, a partial descriptor or a plain
//! value) is normalized into a [`MockDescriptor`] when it is stored. Literal
//! results are wrapped into a producer at that point, never at lookup time.

use serde_json::{Map, Value};
use sqlmock_core::{DataPacket, StepOptions};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Produces the mocked result for a step from its name and options
pub type ResultProducer = Arc<dyn Fn(&str, &StepOptions) -> DataPacket + Send + Sync>;

/// JSON keys recognized as descriptor fields, aliases included
pub const DESCRIPTOR_KEYS: &[&str] = &[
    "mockResults",
    "resultProducer",
    "isError",
    "waitTime",
    "waitMilliseconds",
    "once",
    "disposeAfterUse",
];

/// Partially specified descriptor; missing fields take their defaults
#[derive(Clone, Default)]
pub struct MockSpec {
    /// Literal result
    pub mock_results: Option<DataPacket>,

    /// Callback result; takes precedence over `mock_results`
    pub producer: Option<ResultProducer>,

    /// Deliver the result as a failure
    pub is_error: Option<bool>,

    /// Delay in milliseconds before the result settles
    pub wait_time: Option<f64>,

    /// Remove the mock from the store when it is matched
    pub once: Option<bool>,
}

impl MockSpec {
    /// Empty spec: a `null` result with every default
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a literal result
    pub fn result(mut self, value: impl Into<DataPacket>) -> Self {
        self.mock_results = Some(value.into());
        self
    }

    /// Use a callback result
    pub fn producer<F>(mut self, producer: F) -> Self
    where
        F: Fn(&str, &StepOptions) -> DataPacket + Send + Sync + 'static,
    {
        self.producer = Some(Arc::new(producer));
        self
    }

    /// Deliver the result as a failure
    pub fn error(mut self) -> Self {
        self.is_error = Some(true);
        self
    }

    /// Delay the result
    pub fn wait(mut self, wait: Duration) -> Self {
        self.wait_time = Some(wait.as_micros() as f64 / 1000.0);
        self
    }

    /// Delay the result by a number of milliseconds
    pub fn wait_ms(mut self, ms: f64) -> Self {
        self.wait_time = Some(ms);
        self
    }

    /// Serve the mock once
    pub fn once(mut self) -> Self {
        self.once = Some(true);
        self
    }

    /// Read a descriptor-shaped JSON object.
    ///
    /// Fields are read leniently: flags by truthiness, waits from numbers or
    /// numeric strings. When a field and its alias are both present the
    /// canonical name wins.
    pub fn from_json_map(map: &Map<String, Value>) -> Self {
        let field = |name: &str, alias: &str| map.get(name).or_else(|| map.get(alias));

        Self {
            mock_results: field("mockResults", "resultProducer").cloned().map(DataPacket::new),
            producer: None,
            is_error: map.get("isError").map(truthy),
            wait_time: field("waitTime", "waitMilliseconds").map(wait_millis),
            once: field("once", "disposeAfterUse").map(truthy),
        }
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(false, |n| n != 0.0 && !n.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// Unreadable waits become NaN, which `normalize_wait` turns into zero
fn wait_millis(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => f64::NAN,
    }
}

impl fmt::Debug for MockSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockSpec")
            .field("mock_results", &self.mock_results)
            .field("producer", &self.producer.as_ref().map(|_| "<fn>"))
            .field("is_error", &self.is_error)
            .field("wait_time", &self.wait_time)
            .field("once", &self.once)
            .finish()
    }
}

/// Mock input as handed to `add_mock`
#[derive(Clone)]
pub enum RawMock {
    /// Callback computing the result per step
    Callback(ResultProducer),

    /// Partially specified descriptor
    Descriptor(MockSpec),

    /// Plain result value
    Literal(DataPacket),
}

impl RawMock {
    /// Wrap a closure as a callback mock
    pub fn callback<F>(producer: F) -> Self
    where
        F: Fn(&str, &StepOptions) -> DataPacket + Send + Sync + 'static,
    {
        RawMock::Callback(Arc::new(producer))
    }

    /// Classify a JSON value.
    ///
    /// A non-empty object whose keys are all descriptor fields is a
    /// descriptor, read with [`MockSpec::from_json_map`]; anything else is a
    /// literal result.
    pub fn from_value(value: Value) -> Self {
        match &value {
            Value::Object(map)
                if !map.is_empty()
                    && map.keys().all(|k| DESCRIPTOR_KEYS.contains(&k.as_str())) =>
            {
                RawMock::Descriptor(MockSpec::from_json_map(map))
            }
            _ => RawMock::Literal(DataPacket::new(value)),
        }
    }
}

impl fmt::Debug for RawMock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawMock::Callback(_) => f.write_str("Callback(<fn>)"),
            RawMock::Descriptor(spec) => f.debug_tuple("Descriptor").field(spec).finish(),
            RawMock::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
        }
    }
}

impl From<MockSpec> for RawMock {
    fn from(spec: MockSpec) -> Self {
        RawMock::Descriptor(spec)
    }
}

impl From<DataPacket> for RawMock {
    fn from(value: DataPacket) -> Self {
        RawMock::Literal(value)
    }
}

impl From<Value> for RawMock {
    fn from(value: Value) -> Self {
        RawMock::from_value(value)
    }
}

impl From<ResultProducer> for RawMock {
    fn from(producer: ResultProducer) -> Self {
        RawMock::Callback(producer)
    }
}

/// Canonical stored mock
#[derive(Clone)]
pub struct MockDescriptor {
    producer: ResultProducer,

    /// Deliver the produced value as a failure
    pub is_error: bool,

    /// Delay before the result settles
    pub wait: Duration,

    /// Remove from the store when matched
    pub once: bool,
}

impl MockDescriptor {
    /// Normalize raw input into a descriptor
    pub fn from_raw(raw: RawMock) -> Self {
        match raw {
            RawMock::Callback(producer) => Self {
                producer,
                is_error: false,
                wait: Duration::ZERO,
                once: false,
            },
            RawMock::Descriptor(spec) => {
                let producer = match (spec.producer, spec.mock_results) {
                    (Some(producer), _) => producer,
                    (None, Some(value)) => literal_producer(value),
                    (None, None) => literal_producer(DataPacket::null()),
                };
                Self {
                    producer,
                    is_error: spec.is_error.unwrap_or(false),
                    wait: spec.wait_time.map(normalize_wait).unwrap_or(Duration::ZERO),
                    once: spec.once.unwrap_or(false),
                }
            }
            RawMock::Literal(value) => Self {
                producer: literal_producer(value),
                is_error: false,
                wait: Duration::ZERO,
                once: false,
            },
        }
    }

    /// Compute the result for a step
    pub fn produce(&self, step: &str, options: &StepOptions) -> DataPacket {
        (self.producer)(step, options)
    }

    /// The result producer
    pub fn producer(&self) -> &ResultProducer {
        &self.producer
    }
}

impl fmt::Debug for MockDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockDescriptor")
            .field("is_error", &self.is_error)
            .field("wait", &self.wait)
            .field("once", &self.once)
            .finish_non_exhaustive()
    }
}

fn literal_producer(value: DataPacket) -> ResultProducer {
    Arc::new(move |_, _| value.clone())
}

/// Convert a millisecond delay to a duration; negative or non-finite is zero
pub fn normalize_wait(ms: f64) -> Duration {
    if !ms.is_finite() || ms <= 0.0 {
        return Duration::ZERO;
    }
    Duration::from_micros((ms * 1000.0) as u64)
}
