//! Presence state machine for lanchat.
//!
//! [`PresenceEngine`] owns the membership set and reconciles local commands,
//! inbound messages and resync ticks. It performs no I/O: every call returns
//! a list of [`Action`]s that the caller (chat-client) executes in order.
//!
//! Every transition is total and idempotent, so the engine tolerates lost,
//! duplicated-by-echo and reordered datagrams. A `DISCONNECTED` that overtakes
//! its `CONNECTED` leaves the member absent until the next snapshot or
//! announcement heals it.

use std::collections::{HashMap, VecDeque};

use chat_types::{MemberName, Message};

use crate::membership::{MembershipDiff, MembershipSet};

/// Resync ticks a remote member may stay silent before it is dropped.
pub const DEFAULT_MEMBER_TTL_TICKS: u32 = 3;

/// Own snapshots remembered for echo suppression.
const RECENT_SNAPSHOTS: usize = 8;

/// Inputs to the presence state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The local user joins the group.
    JoinRequested,
    /// The local user leaves the group.
    LeaveRequested,
    /// The local user sends chat text.
    ChatRequested {
        /// Text to send.
        text: String,
    },
    /// The local user asks the group for a snapshot.
    MemberListRequested,
    /// A message arrived from the transport.
    MessageReceived {
        /// The decoded message.
        message: Message,
    },
    /// The resync timer fired.
    ResyncTick,
}

/// Actions to be executed by chat-client.
///
/// These are instructions, not side effects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Send a message to the whole group.
    Broadcast(Message),
    /// Notify the display layer.
    Emit(PresenceEvent),
}

/// Notifications for the display layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// Chat text arrived.
    ChatReceived {
        /// Who sent it.
        sender: MemberName,
        /// The text.
        text: String,
    },
    /// The set of present members changed.
    MembershipChanged {
        /// Everyone present now, in display order.
        members: Vec<MemberName>,
        /// Who became present.
        joined: Vec<MemberName>,
        /// Who became absent.
        left: Vec<MemberName>,
    },
}

/// Membership reconciliation state machine - NO I/O.
#[derive(Debug, Clone)]
pub struct PresenceEngine {
    local: MemberName,
    joined: bool,
    members: MembershipSet,
    /// Resync epoch at which each remote member was last heard from.
    last_seen: HashMap<MemberName, u64>,
    epoch: u64,
    member_ttl_ticks: u32,
    /// Remember our own snapshots so their loopback echo is ignored.
    suppress_echo: bool,
    recent_snapshots: VecDeque<Vec<MemberName>>,
}

impl PresenceEngine {
    /// Create an engine for the given local identity. Not joined yet.
    pub fn new(local: MemberName) -> Self {
        Self {
            local,
            joined: false,
            members: MembershipSet::new(),
            last_seen: HashMap::new(),
            epoch: 0,
            member_ttl_ticks: DEFAULT_MEMBER_TTL_TICKS,
            suppress_echo: true,
            recent_snapshots: VecDeque::with_capacity(RECENT_SNAPSHOTS),
        }
    }

    /// Set how many resync ticks a remote member may stay silent (0 = never
    /// expire).
    pub fn with_member_ttl(mut self, ticks: u32) -> Self {
        self.member_ttl_ticks = ticks;
        self
    }

    /// Whether our own snapshots come back to us (multicast loopback).
    ///
    /// Without loopback nothing echoes, so every inbound snapshot is from a
    /// peer and must be applied.
    pub fn with_echo_suppression(mut self, enabled: bool) -> Self {
        self.suppress_echo = enabled;
        if !enabled {
            self.recent_snapshots.clear();
        }
        self
    }

    /// The local identity.
    pub fn local(&self) -> &MemberName {
        &self.local
    }

    /// Whether the local user has joined.
    pub fn is_joined(&self) -> bool {
        self.joined
    }

    /// Present members in display order.
    pub fn members(&self) -> &[MemberName] {
        self.members.as_slice()
    }

    /// Number of resync ticks processed.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Process an event and return the actions to execute.
    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        match event {
            Event::JoinRequested => self.on_join(),
            Event::LeaveRequested => self.on_leave(),
            Event::ChatRequested { text } => self.on_chat_requested(text),
            Event::MemberListRequested => vec![Action::Broadcast(Message::RequestMemberList {
                requester: self.joined.then(|| self.local.clone()),
            })],
            Event::MessageReceived { message } => self.on_message(message),
            Event::ResyncTick => self.on_tick(),
        }
    }

    fn on_join(&mut self) -> Vec<Action> {
        if self.joined {
            return vec![];
        }
        self.joined = true;

        let mut diff = MembershipDiff::default();
        if self.members.insert(self.local.clone()) {
            diff.joined.push(self.local.clone());
        }

        // Listeners holding the full set answer the request with a snapshot,
        // which converges us without waiting for the next resync.
        let mut actions = vec![
            Action::Broadcast(Message::SystemConnect {
                username: self.local.clone(),
            }),
            Action::Broadcast(Message::RequestMemberList {
                requester: Some(self.local.clone()),
            }),
        ];
        actions.extend(self.changed(diff));
        actions
    }

    fn on_leave(&mut self) -> Vec<Action> {
        if !self.joined {
            return vec![];
        }
        self.joined = false;

        let mut diff = MembershipDiff::default();
        if self.members.remove(&self.local) {
            diff.left.push(self.local.clone());
        }

        let mut actions = vec![Action::Broadcast(Message::SystemDisconnect {
            username: self.local.clone(),
        })];
        actions.extend(self.changed(diff));
        actions
    }

    fn on_chat_requested(&mut self, text: String) -> Vec<Action> {
        if !self.joined || text.is_empty() {
            return vec![];
        }
        vec![Action::Broadcast(Message::Chat {
            sender: self.local.clone(),
            text,
        })]
    }

    fn on_message(&mut self, message: Message) -> Vec<Action> {
        match message {
            Message::Chat { sender, text } => {
                if self.members.contains(&sender) {
                    self.touch(&sender);
                }
                vec![Action::Emit(PresenceEvent::ChatReceived { sender, text })]
            }
            Message::SystemConnect { username } => self.on_connect(username),
            Message::SystemDisconnect { username } => self.on_disconnect(username),
            Message::MemberList { names } => self.on_snapshot(names),
            Message::RequestMemberList { .. } => {
                if self.joined {
                    vec![self.snapshot()]
                } else {
                    vec![]
                }
            }
        }
    }

    fn on_connect(&mut self, username: MemberName) -> Vec<Action> {
        // Our own announcement echoed back, or a stale one after leaving.
        if username == self.local {
            return vec![];
        }

        self.touch(&username);
        if !self.members.insert(username.clone()) {
            return vec![];
        }

        let mut actions = self.changed(MembershipDiff {
            joined: vec![username],
            left: vec![],
        });
        actions.push(self.snapshot());
        actions
    }

    fn on_disconnect(&mut self, username: MemberName) -> Vec<Action> {
        if username == self.local {
            // Someone claims we left while we are still here.
            if self.joined {
                return vec![self.announce()];
            }
            return vec![];
        }

        self.last_seen.remove(&username);
        if !self.members.remove(&username) {
            return vec![];
        }
        self.changed(MembershipDiff {
            joined: vec![],
            left: vec![username],
        })
    }

    fn on_snapshot(&mut self, mut names: Vec<MemberName>) -> Vec<Action> {
        if self.is_own_echo(&names) {
            return vec![];
        }

        // The local process is the authority on its own presence.
        let mut reannounce = false;
        if self.joined && !names.contains(&self.local) {
            names.push(self.local.clone());
            reannounce = true;
        }

        let diff = self.members.replace(&names);
        for name in &diff.joined {
            if *name != self.local {
                self.last_seen.insert(name.clone(), self.epoch);
            }
        }
        for name in &diff.left {
            self.last_seen.remove(name);
        }

        let mut actions = self.changed(diff);
        if reannounce {
            actions.push(self.announce());
        }
        actions
    }

    fn on_tick(&mut self) -> Vec<Action> {
        self.epoch += 1;

        let mut actions = Vec::new();
        if self.member_ttl_ticks > 0 {
            let expired = self.expire();
            actions.extend(self.changed(MembershipDiff {
                joined: vec![],
                left: expired,
            }));
        }
        if self.joined {
            actions.push(self.announce());
        }
        actions
    }

    /// Drop remote members silent for more than the TTL.
    fn expire(&mut self) -> Vec<MemberName> {
        let epoch = self.epoch;
        let ttl = u64::from(self.member_ttl_ticks);
        let local = &self.local;
        let last_seen = &mut self.last_seen;

        let removed = self.members.remove_where(|member| {
            if member == local {
                return false;
            }
            let seen = *last_seen.entry(member.clone()).or_insert(epoch);
            epoch.saturating_sub(seen) > ttl
        });
        for name in &removed {
            last_seen.remove(name);
        }
        removed
    }

    fn touch(&mut self, name: &MemberName) {
        if *name != self.local {
            self.last_seen.insert(name.clone(), self.epoch);
        }
    }

    fn announce(&self) -> Action {
        Action::Broadcast(Message::SystemConnect {
            username: self.local.clone(),
        })
    }

    /// Broadcast the current set and remember it for echo suppression.
    fn snapshot(&mut self) -> Action {
        let names = self.members.to_vec();
        if self.suppress_echo {
            if self.recent_snapshots.len() == RECENT_SNAPSHOTS {
                self.recent_snapshots.pop_front();
            }
            self.recent_snapshots.push_back(names.clone());
        }
        Action::Broadcast(Message::MemberList { names })
    }

    /// A snapshot is not authoritative for the engine that sent it.
    fn is_own_echo(&mut self, names: &[MemberName]) -> bool {
        if !self.suppress_echo {
            return false;
        }
        match self.recent_snapshots.iter().position(|s| s == names) {
            Some(index) => {
                self.recent_snapshots.remove(index);
                true
            }
            None => false,
        }
    }

    fn changed(&self, diff: MembershipDiff) -> Vec<Action> {
        if diff.is_empty() {
            return vec![];
        }
        vec![Action::Emit(PresenceEvent::MembershipChanged {
            members: self.members.to_vec(),
            joined: diff.joined,
            left: diff.left,
        })]
    }
}
