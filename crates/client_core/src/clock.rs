//! Wall-clock ticks for the header time label. Display only.

use std::time::Duration;

use chrono::{DateTime, Local, TimeZone};
use tokio::{sync::broadcast, task::JoinHandle, time};

use crate::ClientEvent;

/// 24-hour `HH:MM:SS`.
pub fn time_label<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    now.format("%H:%M:%S").to_string()
}

pub fn spawn_clock(events: broadcast::Sender<ClientEvent>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(period);
        loop {
            ticker.tick().await;
            let _ = events.send(ClientEvent::ClockTick(time_label(&Local::now())));
        }
    })
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn formats_without_meridiem() {
        let at = NaiveDate::from_ymd_opt(2024, 3, 9)
            .and_then(|d| d.and_hms_opt(17, 5, 3))
            .expect("valid time")
            .and_utc();
        assert_eq!(time_label(&at), "17:05:03");
    }

    #[tokio::test]
    async fn clock_emits_ticks() {
        let (events, mut rx) = broadcast::channel(8);
        let handle = spawn_clock(events, Duration::from_millis(10));

        let first = time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("tick in time")
            .expect("tick");
        assert!(matches!(first, ClientEvent::ClockTick(label) if label.len() == 8));
        handle.abort();
    }
}
