use std::sync::{Arc, Mutex};

use actix_web::web::Bytes;
use ml_core::Gesture;
use serde::Serialize;

/// Latest gesture and encoded frame published by the capture loop.
///
/// Each slot keeps only the newest value. Locks are held for the duration of a
/// single clone or assignment, so readers never wait on detection or encoding.
#[derive(Default)]
pub(crate) struct SharedState {
    gesture: Mutex<Option<Gesture>>,
    frame: Mutex<Option<Bytes>>,
}

pub(crate) type SharedHandle = Arc<SharedState>;

impl SharedState {
    pub(crate) fn new_handle() -> SharedHandle {
        Arc::new(Self::default())
    }

    pub(crate) fn publish_gesture(&self, gesture: Option<Gesture>) {
        if let Ok(mut guard) = self.gesture.lock() {
            *guard = gesture;
        }
    }

    pub(crate) fn publish_frame(&self, jpeg: Bytes) {
        if let Ok(mut guard) = self.frame.lock() {
            *guard = Some(jpeg);
        }
    }

    pub(crate) fn gesture(&self) -> Option<Gesture> {
        match self.gesture.lock() {
            Ok(guard) => *guard,
            Err(_) => None,
        }
    }

    pub(crate) fn latest_frame(&self) -> Option<Bytes> {
        match self.frame.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        }
    }
}

#[derive(Serialize)]
pub(crate) struct GestureResponse {
    pub(crate) gesture: Option<Gesture>,
}

#[cfg(test)]
mod tests {
    use std::{
        sync::atomic::{AtomicBool, Ordering},
        thread,
    };

    use super::*;

    #[test]
    fn empty_until_first_publish() {
        let state = SharedState::default();
        assert_eq!(state.gesture(), None);
        assert!(state.latest_frame().is_none());
    }

    #[test]
    fn last_write_wins_including_none() {
        let state = SharedState::default();
        state.publish_gesture(Some(Gesture::Happy));
        state.publish_gesture(Some(Gesture::Sad));
        assert_eq!(state.gesture(), Some(Gesture::Sad));
        state.publish_gesture(None);
        assert_eq!(state.gesture(), None);

        state.publish_frame(Bytes::from_static(b"first"));
        state.publish_frame(Bytes::from_static(b"second"));
        assert_eq!(state.latest_frame().as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn response_serializes_null_gesture() {
        let body = serde_json::to_string(&GestureResponse { gesture: None }).unwrap();
        assert_eq!(body, r#"{"gesture":null}"#);
        let body = serde_json::to_string(&GestureResponse {
            gesture: Some(Gesture::Happy),
        })
        .unwrap();
        assert_eq!(body, r#"{"gesture":"happy"}"#);
    }

    #[test]
    fn readers_never_see_torn_frames() {
        let state = SharedState::new_handle();
        let done = Arc::new(AtomicBool::new(false));

        let writer = {
            let state = state.clone();
            let done = done.clone();
            thread::spawn(move || {
                for round in 0..2_000u32 {
                    let fill = (round % 251) as u8;
                    let len = 512 + (round as usize % 7) * 64;
                    state.publish_frame(Bytes::from(vec![fill; len]));
                }
                done.store(true, Ordering::SeqCst);
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let state = state.clone();
                let done = done.clone();
                thread::spawn(move || {
                    let mut observed = 0usize;
                    while !done.load(Ordering::SeqCst) || observed == 0 {
                        if let Some(frame) = state.latest_frame() {
                            let first = frame[0];
                            assert!(frame.iter().all(|&b| b == first));
                            assert_eq!((frame.len() - 512) % 64, 0);
                            observed += 1;
                        }
                    }
                    observed
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            assert!(reader.join().unwrap() > 0);
        }
    }
}
