//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements           | Connects to                   |
//! |-------------|----------------------|-------------------------------|
//! | `log_sink`  | AlertSink, EventSink | `log` facade                  |
//! | `polled`    | PositionSource       | any PositionProvider + thread |
//! | `replay`    | PositionProvider     | scripted fixes                |
//! | `time`      | Clock                | system wall clock             |

pub mod log_sink;
pub mod polled;
pub mod replay;
pub mod time;
