//! Obligee address resolution for outgoing correspondence.

use anyhow::Result;
use std::collections::{HashMap, HashSet};

use crate::db::{Store, query};
use crate::model::action::Action;
use crate::model::branch::Branch;
use crate::model::mail::Direction;
use crate::model::obligee::Addressee;

impl Branch {
    /// Addresses to write to about this branch.
    ///
    /// Built from this branch's own messages only: an inbound message
    /// contributes its sender, an outbound one every recipient (to, cc,
    /// bcc). Messages apply in processing order, then action order, so the
    /// latest name seen for an address wins. Addresses of the bound obligee
    /// snapshot apply last and override any name seen in mail.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot, actions, or recipients cannot be
    /// loaded.
    pub fn collect_obligee_emails(&mut self, store: &Store) -> Result<HashSet<Addressee>> {
        let snapshot = self.snapshot(store)?;
        let actions = self.actions_by_email(store)?;

        let outbound: Vec<i64> = actions
            .iter()
            .filter_map(|action| action.message.as_ref())
            .filter(|message| message.direction == Direction::Outbound)
            .map(|message| message.message_id)
            .collect();
        let recipients = query::load_recipients(store, &outbound)?;

        let mut chronological: Vec<&Action> = actions.iter().collect();
        chronological.sort_by_key(|action| {
            (
                action.message.as_ref().and_then(|m| m.processed_at_us),
                action.position,
            )
        });

        let mut names: HashMap<String, String> = HashMap::new();
        for message in chronological.iter().filter_map(|a| a.message.as_ref()) {
            match message.direction {
                Direction::Inbound => {
                    names.insert(message.from_mail.clone(), message.from_name.clone());
                }
                Direction::Outbound => {
                    for recipient in recipients.get(&message.message_id).into_iter().flatten() {
                        names.insert(recipient.mail.clone(), recipient.name.clone());
                    }
                }
            }
        }

        for addressee in snapshot.addresses() {
            names.insert(addressee.address, addressee.name);
        }

        tracing::debug!(
            branch_id = self.branch_id,
            addresses = names.len(),
            "collected obligee emails"
        );
        Ok(names
            .into_iter()
            .map(|(address, name)| Addressee { name, address })
            .collect())
    }
}
