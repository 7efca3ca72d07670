//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter         | Implements         | Connects to                |
//! |-----------------|--------------------|----------------------------|
//! | `hardware`      | RangingPort        | HC-SR04 pair on ESP32 GPIO |
//! | `http_reporter` | EventReporter      | Remote collector (HTTP)    |
//! | `log_sink`      | EventSink          | Serial log output          |
//! | `query_server`  | (inbound)          | Local HTTP clients         |
//! | `time`          | MonotonicClock     | ESP32 system timer         |
//! | `wifi`          | ConnectivityPort   | ESP-IDF WiFi STA           |

pub mod hardware;
pub mod http_reporter;
pub mod log_sink;
pub mod query_server;
pub mod time;
pub mod wifi;
