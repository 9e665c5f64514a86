//! Registry of callbacks notified whenever a request has been processed.

use crate::request::{RequestInfo, RequestType, SenderId, SpecificRequest};
use std::rc::Rc;

pub type RequestCallback = Rc<dyn Fn(&RequestInfo)>;

struct Subscription {
    callback: RequestCallback,
    sender: Option<SenderId>,
    request_type: RequestType,
    specific_mask: SpecificRequest,
}

impl Subscription {
    fn wants(&self, info: &RequestInfo) -> bool {
        (self.specific_mask & info.specific_request) != 0
            && (self.sender.is_none() || self.sender == info.sender)
            && (self.request_type == RequestType::AllRequests
                || self.request_type == info.request_type)
    }
}

#[derive(Default)]
pub struct RequestListenerManager {
    subscriptions: Vec<Subscription>,
}

impl RequestListenerManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `callback` to requests of `request_type` whose specific bit
    /// is in `specific_mask`. `sender` restricts notifications to requests
    /// issued by that sender; `None` accepts any sender.
    ///
    /// Adding an identical subscription twice keeps a single entry. Always
    /// succeeds.
    pub fn add_request_listener(
        &mut self,
        callback: RequestCallback,
        sender: Option<SenderId>,
        request_type: RequestType,
        specific_mask: SpecificRequest,
    ) -> bool {
        let exists = self.subscriptions.iter().any(|s| {
            Rc::ptr_eq(&s.callback, &callback)
                && s.sender == sender
                && s.request_type == request_type
                && s.specific_mask == specific_mask
        });

        if !exists {
            self.subscriptions.push(Subscription {
                callback,
                sender,
                request_type,
                specific_mask,
            });
        }
        true
    }

    /// Removes every subscription matching `callback` and `sender`. `None`
    /// acts as a wildcard for either.
    pub fn remove_request_listener(
        &mut self,
        callback: Option<&RequestCallback>,
        sender: Option<SenderId>,
    ) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| {
            let callback_matches = callback.is_none_or(|c| Rc::ptr_eq(&s.callback, c));
            let sender_matches = sender.is_none() || s.sender == sender;
            !(callback_matches && sender_matches)
        });

        let removed = self.subscriptions.len() < before;
        if !removed {
            log::warn!("failed to remove request listener (sender {:?})", sender);
        }
        removed
    }

    pub fn notify_listener(&self, info: &RequestInfo) {
        for subscription in self.subscriptions.iter().filter(|s| s.wants(info)) {
            (subscription.callback)(info);
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
