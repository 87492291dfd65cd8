//! Parameter coercion.
//!
//! Artifact parameters are declared with a type keyword; arguments arrive as
//! loosely typed [`Value`](crate::models::Value)s. The coercer turns each
//! argument into the value its source's query sees, recording a warning
//! (never an error) whenever it has to guess.
//!
//! | type         | accepted input                                 | bound value          |
//! |--------------|------------------------------------------------|----------------------|
//! | `bool`       | bool, `Y`/`N`-style text, numbers              | `Bool`               |
//! | `choices`    | any scalar                                     | `String`             |
//! | `timestamp`  | epoch seconds, RFC 3339 text, instants         | `Timestamp` (UTC)    |
//! | `int`        | integers, integral floats, numeric text        | `Int`                |
//! | `float`      | numbers, numeric text                          | `Float`              |
//! | `csv`        | list of records, CSV text                      | CSV `String`         |
//! | `json_array` | list of records, JSON array/object text        | JSON `String`        |
//! | `string`     | anything                                       | `String`             |

pub mod coerce;

pub use coerce::{Coerced, ParameterBinding, ParameterCoercer};
