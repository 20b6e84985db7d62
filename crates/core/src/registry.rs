// Keyed session table for the request dispatcher side

use crate::callback::{EventDispatcher, EventSink};
use crate::completion::Pending;
use crate::config::{PrepareOptions, SessionConfig};
use crate::engine::EngineFactory;
use crate::error::{AudioError, Result};
use crate::session::PlaybackSession;
use crate::state::PlayerKey;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One session per player key, all reporting to the same sinks
pub struct SessionRegistry {
    factory: Arc<dyn EngineFactory>,
    events: Arc<EventDispatcher>,
    config: SessionConfig,
    sessions: Mutex<HashMap<PlayerKey, PlaybackSession>>,
}

impl SessionRegistry {
    pub fn new(factory: Arc<dyn EngineFactory>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            factory,
            events: Arc::new(EventDispatcher::new()),
            config,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    pub fn add_sink(&self, sink: Arc<dyn EventSink>) {
        self.events.add_sink(sink);
    }

    /// Existing session for `key`, or a fresh one
    pub fn get_or_create(&self, key: impl Into<PlayerKey>) -> Result<PlaybackSession> {
        let key = key.into();
        let mut sessions = self.sessions.lock();
        if let Some(session) = sessions.get(&key) {
            return Ok(session.clone());
        }
        let session = PlaybackSession::new(
            key.clone(),
            self.factory.clone(),
            self.events.clone(),
            self.config.clone(),
        )?;
        log::info!("Created session {}", key);
        sessions.insert(key, session.clone());
        Ok(session)
    }

    /// Prepare `source` on the session for `key`, creating it on first use
    pub fn prepare(
        &self,
        key: impl Into<PlayerKey>,
        source: &str,
        options: PrepareOptions,
    ) -> Result<Pending<()>> {
        if source.trim().is_empty() {
            return Err(AudioError::InvalidArgument(
                "path to audio file can't be empty".to_string(),
            ));
        }
        self.get_or_create(key)?.prepare(source, options)
    }

    /// Session for `key`; `InvalidArgument` if none was created
    pub fn session(&self, key: &PlayerKey) -> Result<PlaybackSession> {
        self.sessions
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| AudioError::InvalidArgument(format!("unknown player key: {}", key)))
    }

    pub fn contains(&self, key: &PlayerKey) -> bool {
        self.sessions.lock().contains_key(key)
    }

    pub fn keys(&self) -> Vec<PlayerKey> {
        let mut keys: Vec<_> = self.sessions.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Stop, release and shut down the session for `key`
    pub fn remove(&self, key: &PlayerKey) -> bool {
        let session = self.sessions.lock().remove(key);
        match session {
            Some(session) => {
                close(&session);
                true
            }
            None => false,
        }
    }

    /// Stop and release every session, e.g. when the host detaches
    pub fn stop_all(&self) {
        let sessions: Vec<_> = self.sessions.lock().drain().map(|(_, s)| s).collect();
        log::info!("Stopping {} sessions", sessions.len());
        for session in sessions.iter() {
            close(session);
        }
    }
}

impl Drop for SessionRegistry {
    fn drop(&mut self) {
        self.stop_all();
    }
}

fn close(session: &PlaybackSession) {
    // A session without a handle has nothing to stop
    if let Err(e) = session.stop() {
        log::debug!("[{}] stop on close: {}", session.key(), e);
    }
    if let Err(e) = session.release() {
        log::warn!("[{}] release on close failed: {}", session.key(), e);
    }
    session.shutdown();
}
