//! Tests for mailbox implementations

use std::time::Duration;

use chrono::NaiveDate;
use hospital_capacity_sim::core::{
    AdmissionOutcome, Mailbox, Notification, StepCompletion,
};
use hospital_capacity_sim::infra::mailbox::memory::InMemoryMailbox;
use hospital_capacity_sim::infra::ChannelMailbox;
use hospital_capacity_sim::util::serde::{CallbackRef, PatientStatus};

fn admitted(id: &str) -> Notification {
    Notification::Admission(AdmissionOutcome {
        status: PatientStatus::Admitted,
        patient_id: id.to_string(),
        arrival_time: NaiveDate::from_ymd_opt(2018, 1, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap(),
    })
}

#[tokio::test]
async fn test_in_memory_mailbox_deliver_and_fetch() {
    let mailbox = InMemoryMailbox::new();
    let cb = CallbackRef::new("cb-1");

    mailbox.deliver(&cb, admitted("p1")).await.unwrap();
    mailbox.deliver(&cb, admitted("p2")).await.unwrap();

    let messages = mailbox.fetch(&cb, None, 10);
    assert_eq!(messages.len(), 2);
    assert_eq!(mailbox.fetch(&cb, None, 1).len(), 1);
    assert_eq!(mailbox.first(&cb), Some(admitted("p1")));
    assert!(mailbox.fetch(&CallbackRef::new("other"), None, 10).is_empty());
    assert_eq!(mailbox.len(), 2);
}

#[tokio::test]
async fn test_take_drops_the_callback() {
    let mailbox = InMemoryMailbox::new();
    let cb = CallbackRef::new("cb-1");
    mailbox.deliver(&cb, admitted("p1")).await.unwrap();
    mailbox.deliver(&CallbackRef::new("cb-2"), admitted("p2")).await.unwrap();
    assert_eq!(mailbox.callbacks(), 2);

    let taken = mailbox.take(&cb);
    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].notification, admitted("p1"));
    assert_eq!(mailbox.callbacks(), 1);
    assert!(mailbox.first(&cb).is_none());
    assert!(mailbox.take(&cb).is_empty());
}

#[tokio::test]
async fn test_wait_for_sees_later_delivery() {
    let mailbox = std::sync::Arc::new(InMemoryMailbox::new());
    let cb = CallbackRef::new("late");
    let writer = mailbox.clone();
    let target = cb.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let done = StepCompletion::new(PatientStatus::SurgeryFinished, 2.0);
        writer
            .deliver(&target, Notification::StepFinished(done))
            .await
            .unwrap();
    });

    let got = mailbox.wait_for(&cb, Duration::from_secs(5)).await;
    assert!(matches!(got, Some(Notification::StepFinished(_))));
}

#[tokio::test]
async fn test_wait_for_times_out() {
    let mailbox = InMemoryMailbox::new();
    let got = mailbox
        .wait_for(&CallbackRef::new("never"), Duration::from_millis(5))
        .await;
    assert!(got.is_none());
}

#[tokio::test]
async fn test_channel_mailbox_forwards() {
    let (mailbox, rx) = ChannelMailbox::unbounded();
    let cb = CallbackRef::new("chan");
    mailbox.deliver(&cb, admitted("p3")).await.unwrap();
    let (got_cb, note) = rx.try_recv().expect("envelope");
    assert_eq!(got_cb, cb);
    assert_eq!(note, admitted("p3"));
}

#[tokio::test]
async fn test_channel_mailbox_closed_receiver() {
    let (mailbox, rx) = ChannelMailbox::unbounded();
    drop(rx);
    let err = mailbox
        .deliver(&CallbackRef::new("gone"), admitted("p4"))
        .await;
    assert!(err.is_err());
}
