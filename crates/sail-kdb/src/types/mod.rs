//! Conversion of Rust values into q literals
//!
//! Arguments sent to the store are rendered as q source text. This module
//! defines the value model accepted by remote calls and the rendering rules
//! for each kind of value.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::collections::BTreeMap;
use std::fmt;

/// Keyword arguments of a remote call, ordered by name
pub type Kwargs = BTreeMap<String, QValue>;

/// A q symbol, rendered as `` `value ``
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol(pub String);

impl Symbol {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}", self.0)
    }
}

/// Argument value passed to a remote function
#[derive(Debug, Clone, PartialEq)]
pub enum QValue {
    Symbol(String),
    String(String),
    Bool(bool),
    Int(i64),
    Float(f64),
    List(Vec<QValue>),
    Dict(Vec<(QValue, QValue)>),
    Null,
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    Timespan(TimeDelta),
    /// Pre-rendered q text, sent as is
    Raw(String),
}

impl QValue {
    pub fn symbol(value: impl Into<String>) -> Self {
        QValue::Symbol(value.into())
    }

    /// List of symbols, e.g. for a `symbols` keyword argument
    pub fn symbols<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        QValue::List(values.into_iter().map(|v| QValue::Symbol(v.into())).collect())
    }

    pub fn dict<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<QValue>,
        V: Into<QValue>,
    {
        QValue::Dict(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Items of a list value
    pub fn as_list(&self) -> Option<&[QValue]> {
        match self {
            QValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Render as a q literal
    pub fn render(&self) -> String {
        match self {
            QValue::Symbol(s) => format!("`{}", s),
            QValue::String(s) => format!("\"{}\"", escape(s)),
            QValue::Bool(true) => "1b".to_string(),
            QValue::Bool(false) => "0b".to_string(),
            QValue::Int(i) => i.to_string(),
            QValue::Float(f) => render_float(*f),
            QValue::List(items) => render_list(items),
            QValue::Dict(entries) => {
                let keys: Vec<QValue> = entries.iter().map(|(k, _)| k.clone()).collect();
                let values: Vec<QValue> = entries.iter().map(|(_, v)| v.clone()).collect();
                format!("({})!{}", render_list(&keys), render_list(&values))
            }
            QValue::Null => "0N".to_string(),
            QValue::DateTime(ts) => format!("\"{}\"", ts.format("%Y.%m.%dD%H:%M:%S%.3f")),
            QValue::Date(d) => format!("\"{}\"", d.format("%Y.%m.%d")),
            QValue::Time(t) => format!("\"{}\"", t.format("%H:%M:%S%.3f")),
            QValue::Timespan(span) => format!("\"{}\"", render_timespan(span)),
            QValue::Raw(text) => text.clone(),
        }
    }
}

impl fmt::Display for QValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

fn render_float(f: f64) -> String {
    if f.is_nan() {
        "0n".to_string()
    } else if f == f64::INFINITY {
        "0w".to_string()
    } else if f == f64::NEG_INFINITY {
        "-0w".to_string()
    } else {
        // Debug keeps the fractional part ("1.0"), so q reads a float not a long
        format!("{:?}", f)
    }
}

/// Space separated items; nested lists are parenthesised. A single item is
/// enlisted so a halved dimension still reaches the store as a list.
fn render_list(items: &[QValue]) -> String {
    match items {
        [] => "()".to_string(),
        [item] => format!("enlist {}", render_item(item)),
        _ => items
            .iter()
            .map(render_item)
            .collect::<Vec<_>>()
            .join(" "),
    }
}

fn render_item(item: &QValue) -> String {
    match item {
        QValue::List(_) | QValue::Dict(_) => format!("({})", item.render()),
        _ => item.render(),
    }
}

fn render_timespan(span: &TimeDelta) -> String {
    let sign = if *span < TimeDelta::zero() { "-" } else { "" };
    let span = span.abs();
    let total_seconds = span.num_seconds();
    let millis = span.num_milliseconds() % 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!(
        "{}{:02}:{:02}:{:02}.{:03}",
        sign, hours, minutes, seconds, millis
    )
}

impl From<Symbol> for QValue {
    fn from(value: Symbol) -> Self {
        QValue::Symbol(value.0)
    }
}

impl From<&str> for QValue {
    fn from(value: &str) -> Self {
        QValue::String(value.to_string())
    }
}

impl From<String> for QValue {
    fn from(value: String) -> Self {
        QValue::String(value)
    }
}

impl From<bool> for QValue {
    fn from(value: bool) -> Self {
        QValue::Bool(value)
    }
}

impl From<i32> for QValue {
    fn from(value: i32) -> Self {
        QValue::Int(value.into())
    }
}

impl From<i64> for QValue {
    fn from(value: i64) -> Self {
        QValue::Int(value)
    }
}

impl From<u32> for QValue {
    fn from(value: u32) -> Self {
        QValue::Int(value.into())
    }
}

impl From<f64> for QValue {
    fn from(value: f64) -> Self {
        QValue::Float(value)
    }
}

impl From<NaiveDateTime> for QValue {
    fn from(value: NaiveDateTime) -> Self {
        QValue::DateTime(value)
    }
}

impl From<NaiveDate> for QValue {
    fn from(value: NaiveDate) -> Self {
        QValue::Date(value)
    }
}

impl From<NaiveTime> for QValue {
    fn from(value: NaiveTime) -> Self {
        QValue::Time(value)
    }
}

impl From<TimeDelta> for QValue {
    fn from(value: TimeDelta) -> Self {
        QValue::Timespan(value)
    }
}

impl<T: Into<QValue>> From<Vec<T>> for QValue {
    fn from(value: Vec<T>) -> Self {
        QValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<QValue>> From<Option<T>> for QValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(QValue::Null, Into::into)
    }
}

/// A remote function invocation: name, positional and keyword arguments
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub function: String,
    pub args: Vec<QValue>,
    pub kwargs: Kwargs,
}

impl Command {
    pub fn new(function: impl Into<String>, args: Vec<QValue>, kwargs: Kwargs) -> Self {
        Self {
            function: function.into(),
            args,
            kwargs,
        }
    }

    /// Copy of this command with one keyword argument replaced
    pub fn with_kwarg(&self, name: &str, value: QValue) -> Self {
        let mut kwargs = self.kwargs.clone();
        kwargs.insert(name.to_string(), value);
        Self {
            function: self.function.clone(),
            args: self.args.clone(),
            kwargs,
        }
    }

    /// Render as q source text
    pub fn render(&self) -> String {
        let mut params = self.args.clone();
        if !self.kwargs.is_empty() {
            params.push(QValue::Raw(render_kwargs(&self.kwargs)));
        }
        QueryBuilder::new(&self.function, params).build()
    }
}

/// Keyword arguments as one dictionary with symbol keys
fn render_kwargs(kwargs: &Kwargs) -> String {
    if kwargs.len() == 1 {
        if let Some((name, value)) = kwargs.iter().next() {
            return format!("(enlist`{})!enlist {}", name, value.render());
        }
    }
    let keys: String = kwargs.keys().map(|k| format!("`{}", k)).collect();
    let values = kwargs
        .values()
        .map(QValue::render)
        .collect::<Vec<_>>()
        .join(";");
    format!("{}!({})", keys, values)
}

/// Builds q call text of the form `function[p1; p2; ...]`
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    function: String,
    params: Vec<QValue>,
}

impl QueryBuilder {
    pub fn new(function: impl Into<String>, params: Vec<QValue>) -> Self {
        Self {
            function: function.into(),
            params,
        }
    }

    /// The bare function name when there are no parameters
    pub fn build(&self) -> String {
        if self.params.is_empty() {
            return self.function.clone();
        }
        let params = self
            .params
            .iter()
            .map(QValue::render)
            .collect::<Vec<_>>()
            .join("; ");
        format!("{}[{}]", self.function, params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_literals() {
        assert_eq!(QValue::from(Symbol::new("testSym")).render(), "`testSym");
        assert_eq!(QValue::from(true).render(), "1b");
        assert_eq!(QValue::from(false).render(), "0b");
        assert_eq!(QValue::from(42).render(), "42");
        assert_eq!(QValue::from(3.14).render(), "3.14");
        assert_eq!(QValue::from(1.0).render(), "1.0");
        assert_eq!(QValue::from(f64::NAN).render(), "0n");
        assert_eq!(QValue::Null.render(), "0N");
        assert_eq!(QValue::from(None::<i64>).render(), "0N");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(QValue::from("hello \"world\"").render(), r#""hello \"world\"""#);
        assert_eq!(QValue::from(r"a\b").render(), r#""a\\b""#);
    }

    #[test]
    fn test_temporal_literals() {
        let date = NaiveDate::from_ymd_opt(2021, 7, 5).unwrap();
        let time = NaiveTime::from_hms_milli_opt(12, 34, 56, 789).unwrap();

        assert_eq!(QValue::from(date).render(), "\"2021.07.05\"");
        assert_eq!(QValue::from(time).render(), "\"12:34:56.789\"");
        assert_eq!(
            QValue::from(date.and_time(time)).render(),
            "\"2021.07.05D12:34:56.789\""
        );

        let span = TimeDelta::hours(1)
            + TimeDelta::minutes(23)
            + TimeDelta::seconds(45)
            + TimeDelta::milliseconds(123);
        assert_eq!(QValue::from(span).render(), "\"01:23:45.123\"");
        assert_eq!(QValue::from(TimeDelta::hours(30)).render(), "\"30:00:00.000\"");
    }

    #[test]
    fn test_list_and_dict() {
        assert_eq!(QValue::from(vec![1, 2, 3]).render(), "1 2 3");
        assert_eq!(QValue::symbols(["AAPL", "GOOG"]).render(), "`AAPL `GOOG");
        assert_eq!(QValue::List(vec![]).render(), "()");
        assert_eq!(
            QValue::from(vec![vec![1, 2], vec![3]]).render(),
            "(1 2) (enlist 3)"
        );
        assert_eq!(
            QValue::dict([(QValue::symbol("a"), QValue::from(1)), (QValue::symbol("b"), QValue::from("text"))])
                .render(),
            "(`a `b)!1 \"text\""
        );
        assert_eq!(
            QValue::dict([(QValue::symbol("a"), QValue::from(1))]).render(),
            "(enlist `a)!enlist 1"
        );
    }

    #[test]
    fn test_single_item_list_is_enlisted() {
        assert_eq!(QValue::symbols(["AAPL"]).render(), "enlist `AAPL");
        assert_eq!(QValue::from(vec![42]).render(), "enlist 42");

        let mut kwargs = Kwargs::new();
        kwargs.insert("symbols".to_string(), QValue::symbols(["AAPL"]));
        assert_eq!(
            Command::new("getDataByDate", vec![], kwargs).render(),
            "getDataByDate[(enlist`symbols)!enlist enlist `AAPL]"
        );
    }

    #[test]
    fn test_build_without_params() {
        assert_eq!(QueryBuilder::new("getArrowData", vec![]).build(), "getArrowData");
    }

    #[test]
    fn test_build_with_params() {
        let query = QueryBuilder::new(
            "myFunc",
            vec![42.into(), Symbol::new("x").into(), vec![1, 2, 3].into(), QValue::Null],
        )
        .build();
        assert_eq!(query, "myFunc[42; `x; 1 2 3; 0N]");
    }

    #[test]
    fn test_command_kwargs() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("symbols".to_string(), QValue::symbols(["AAPL", "MSFT"]));
        let command = Command::new("getDataByDate", vec![], kwargs);
        assert_eq!(
            command.render(),
            "getDataByDate[(enlist`symbols)!enlist `AAPL `MSFT]"
        );

        let command = command.with_kwarg("date", QValue::from("2025.01.01"));
        assert_eq!(
            command.render(),
            "getDataByDate[`date`symbols!(\"2025.01.01\";`AAPL `MSFT)]"
        );
    }

    #[test]
    fn test_with_kwarg_leaves_original() {
        let mut kwargs = Kwargs::new();
        kwargs.insert("symbols".to_string(), QValue::symbols(["A", "B"]));
        let command = Command::new("f", vec![QValue::from(1)], kwargs);

        let left = command.with_kwarg("symbols", QValue::symbols(["A"]));
        assert_eq!(left.args, command.args);
        assert_eq!(left.kwargs["symbols"], QValue::symbols(["A"]));
        assert_eq!(command.kwargs["symbols"], QValue::symbols(["A", "B"]));
    }
}
