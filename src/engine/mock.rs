//! Mock Engine for Testing
//!
//! In-memory `Engine`, `EngineClient` and `DeviceStore` implementations.
//! Every call is journaled so tests can assert on ordering (presence before
//! upload before dispatch) and on what never happened.

use super::message::{ContentKind, OutboundMessage};
use super::traits::*;
use super::types::*;
use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::mpsc;

/// Capacity of the pairing event channel handed out by `pairing_events`
const PAIRING_CHANNEL_CAPACITY: usize = 8;

/// A recorded client call
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    Connect,
    Disconnect,
    Logout,
    PairingFeed,
    Lookup(Vec<String>),
    Upload(MediaCategory),
    Send(ContentKind),
    Presence(Presence),
    ChatPresence(Jid, ChatPresence, ChatPresenceMedia),
    JoinedGroups,
}

/// Mock engine that builds `MockClient`s and remembers them
#[derive(Clone, Default)]
pub struct MockEngine {
    state: Arc<Mutex<EngineState>>,
}

#[derive(Default)]
struct EngineState {
    clients: Vec<MockClient>,
    fail_new_client: bool,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every client built so far, in creation order
    pub fn clients(&self) -> Vec<MockClient> {
        self.state.lock().unwrap().clients.clone()
    }

    pub fn set_fail_new_client(&self, fail: bool) {
        self.state.lock().unwrap().fail_new_client = fail;
    }
}

impl Engine for MockEngine {
    type Client = MockClient;

    fn new_client(&self, device: Device, options: &ClientOptions) -> EngineResult<MockClient> {
        let mut state = self.state.lock().unwrap();
        if state.fail_new_client {
            return Err(EngineError::Protocol("client construction refused".to_string()));
        }
        let client = MockClient::new(device, options.clone());
        state.clients.push(client.clone());
        Ok(client)
    }
}

/// Mock engine client
#[derive(Clone)]
pub struct MockClient {
    state: Arc<Mutex<ClientState>>,
    options: ClientOptions,
}

struct ClientState {
    device: Device,
    connected: bool,
    logged_in: bool,
    paired_jid: Jid,
    registered: HashMap<String, Jid>,
    groups: Vec<GroupInfo>,
    pairing_script: Vec<PairingEvent>,
    pairing_tx: Option<mpsc::Sender<PairingEvent>>,
    connect_error: Option<EngineError>,
    logout_error: Option<EngineError>,
    send_error: Option<EngineError>,
    lookup_error: Option<EngineError>,
    failing_uploads: HashSet<MediaCategory>,
    fail_presence: bool,
    calls: Vec<MockCall>,
    sent: Vec<OutboundMessage>,
    uploads: Vec<(MediaCategory, Vec<u8>)>,
}

impl MockClient {
    pub fn new(device: Device, options: ClientOptions) -> Self {
        let state = ClientState {
            device,
            connected: false,
            logged_in: false,
            paired_jid: Jid::user("628000000001"),
            registered: HashMap::new(),
            groups: Vec::new(),
            pairing_script: vec![PairingEvent::Code {
                code: "2@mock-ref,mock-noise,mock-identity,mock-adv".to_string(),
                timeout: Duration::from_secs(60),
            }],
            pairing_tx: None,
            connect_error: None,
            logout_error: None,
            send_error: None,
            lookup_error: None,
            failing_uploads: HashSet::new(),
            fail_presence: false,
            calls: Vec::new(),
            sent: Vec::new(),
            uploads: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
            options,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClientState> {
        self.state.lock().unwrap()
    }

    /// Options the engine built this client with
    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Give the device a durable identity without running a pairing
    pub fn pair_as(&self, jid: Jid) {
        self.lock().device.id = Some(jid);
    }

    /// Put the client in the connected + logged-in state
    pub fn set_online(&self) {
        let mut state = self.lock();
        state.connected = true;
        state.logged_in = true;
    }

    pub fn set_connected(&self, connected: bool) {
        self.lock().connected = connected;
    }

    pub fn set_logged_in(&self, logged_in: bool) {
        self.lock().logged_in = logged_in;
    }

    /// Register a number; lookups for it resolve to a standard user jid
    pub fn register(&self, number: &str) {
        self.register_as(number, Jid::user(number));
    }

    /// Register a lookup key with an explicit canonical jid
    pub fn register_as(&self, number: &str, jid: Jid) {
        self.lock().registered.insert(number.to_string(), jid);
    }

    pub fn add_group(&self, group: GroupInfo) {
        self.lock().groups.push(group);
    }

    /// Events emitted (in order) on the next `connect` of an unpaired device
    pub fn script_pairing(&self, events: Vec<PairingEvent>) {
        self.lock().pairing_script = events;
    }

    /// Identity assigned when a scripted `PairingEvent::Success` is emitted
    pub fn set_paired_jid(&self, jid: Jid) {
        self.lock().paired_jid = jid;
    }

    pub fn fail_connect(&self, error: Option<EngineError>) {
        self.lock().connect_error = error;
    }

    pub fn fail_logout(&self, error: Option<EngineError>) {
        self.lock().logout_error = error;
    }

    pub fn fail_send(&self, error: Option<EngineError>) {
        self.lock().send_error = error;
    }

    pub fn fail_lookup(&self, error: Option<EngineError>) {
        self.lock().lookup_error = error;
    }

    pub fn fail_upload(&self, category: MediaCategory) {
        self.lock().failing_uploads.insert(category);
    }

    pub fn fail_presence(&self, fail: bool) {
        self.lock().fail_presence = fail;
    }

    /// Call journal
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.lock().sent.clone()
    }

    pub fn uploads(&self) -> Vec<(MediaCategory, Vec<u8>)> {
        self.lock().uploads.clone()
    }

    /// Chat presence updates in the order they were sent
    pub fn chat_presence(&self) -> Vec<(Jid, ChatPresence, ChatPresenceMedia)> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::ChatPresence(jid, state, media) => Some((jid.clone(), *state, *media)),
                _ => None,
            })
            .collect()
    }

    /// Global presence updates in the order they were sent
    pub fn presence(&self) -> Vec<Presence> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                MockCall::Presence(p) => Some(*p),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, call: &MockCall) -> usize {
        self.lock().calls.iter().filter(|c| *c == call).count()
    }
}

/// Mark a scripted pairing as complete
fn complete_pairing(state: &Mutex<ClientState>) {
    let mut state = state.lock().unwrap();
    let jid = state.paired_jid.clone();
    state.device.id = Some(jid);
    state.logged_in = true;
}

#[async_trait]
impl EngineClient for MockClient {
    fn device(&self) -> Device {
        self.lock().device.clone()
    }

    fn is_connected(&self) -> bool {
        self.lock().connected
    }

    fn is_logged_in(&self) -> bool {
        self.lock().logged_in
    }

    async fn connect(&self) -> EngineResult<()> {
        let pairing = {
            let mut state = self.lock();
            state.calls.push(MockCall::Connect);
            if let Some(err) = state.connect_error.clone() {
                return Err(err);
            }
            state.connected = true;
            if state.device.has_identity() {
                state.logged_in = true;
                None
            } else {
                let script = state.pairing_script.clone();
                state.pairing_tx.take().map(|tx| (tx, script))
            }
        };

        if let Some((tx, script)) = pairing {
            let inner = Arc::clone(&self.state);
            tokio::spawn(async move {
                for event in script {
                    if event == PairingEvent::Success {
                        complete_pairing(&inner);
                    }
                    if tx.send(event).await.is_err() {
                        break;
                    }
                }
            });
        }

        Ok(())
    }

    fn disconnect(&self) {
        let mut state = self.lock();
        state.calls.push(MockCall::Disconnect);
        state.connected = false;
    }

    async fn logout(&self) -> EngineResult<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Logout);
        if let Some(err) = state.logout_error.clone() {
            return Err(err);
        }
        state.device.id = None;
        state.logged_in = false;
        state.connected = false;
        Ok(())
    }

    async fn pairing_events(&self) -> EngineResult<mpsc::Receiver<PairingEvent>> {
        let (tx, rx) = mpsc::channel(PAIRING_CHANNEL_CAPACITY);
        let mut state = self.lock();
        state.calls.push(MockCall::PairingFeed);
        state.pairing_tx = Some(tx);
        Ok(rx)
    }

    async fn send_message(&self, message: &OutboundMessage) -> EngineResult<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Send(message.kind()));
        if !state.connected {
            return Err(EngineError::NotConnected);
        }
        if let Some(err) = state.send_error.clone() {
            return Err(err);
        }
        state.sent.push(message.clone());
        Ok(())
    }

    async fn upload(&self, data: &[u8], category: MediaCategory) -> EngineResult<UploadedHandle> {
        let mut state = self.lock();
        state.calls.push(MockCall::Upload(category));
        if state.failing_uploads.contains(&category) {
            return Err(EngineError::Network(format!("{} upload refused", category)));
        }
        state.uploads.push((category, data.to_vec()));

        let mut media_key = vec![0u8; 32];
        rand::thread_rng().fill_bytes(&mut media_key);

        let mut enc = Sha256::new();
        enc.update(&media_key);
        enc.update(data);

        let direct_path = format!("/v/{}/{}", category, uuid::Uuid::new_v4());
        Ok(UploadedHandle {
            url: format!("https://media.mock.invalid{}", direct_path),
            direct_path,
            file_length: data.len() as u64,
            file_sha256: Sha256::digest(data).to_vec(),
            file_enc_sha256: enc.finalize().to_vec(),
            media_key,
        })
    }

    async fn is_on_network(&self, phones: &[String]) -> EngineResult<Vec<RegistrationInfo>> {
        let mut state = self.lock();
        state.calls.push(MockCall::Lookup(phones.to_vec()));
        if let Some(err) = state.lookup_error.clone() {
            return Err(err);
        }
        Ok(phones
            .iter()
            .map(|phone| {
                let number = phone.trim_start_matches('+');
                match state.registered.get(number) {
                    Some(jid) => RegistrationInfo {
                        query: phone.clone(),
                        jid: jid.clone(),
                        registered: true,
                    },
                    None => RegistrationInfo {
                        query: phone.clone(),
                        jid: Jid::user(number),
                        registered: false,
                    },
                }
            })
            .collect())
    }

    async fn joined_groups(&self) -> EngineResult<Vec<GroupInfo>> {
        let mut state = self.lock();
        state.calls.push(MockCall::JoinedGroups);
        if let Some(err) = state.lookup_error.clone() {
            return Err(err);
        }
        Ok(state.groups.clone())
    }

    async fn send_presence(&self, presence: Presence) -> EngineResult<()> {
        let mut state = self.lock();
        state.calls.push(MockCall::Presence(presence));
        if state.fail_presence {
            return Err(EngineError::Network("presence refused".to_string()));
        }
        Ok(())
    }

    async fn send_chat_presence(
        &self,
        chat: &Jid,
        presence: ChatPresence,
        media: ChatPresenceMedia,
    ) -> EngineResult<()> {
        let mut state = self.lock();
        state
            .calls
            .push(MockCall::ChatPresence(chat.clone(), presence, media));
        if state.fail_presence {
            return Err(EngineError::Network("chat presence refused".to_string()));
        }
        Ok(())
    }
}

/// Mock device datastore
#[derive(Clone, Default)]
pub struct MockDeviceStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    next_registration_id: u32,
    created: Vec<Device>,
    deleted: Vec<Device>,
    fail_new: bool,
    fail_delete: bool,
}

impl MockDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> Vec<Device> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn deleted(&self) -> Vec<Device> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn set_fail_new(&self, fail: bool) {
        self.state.lock().unwrap().fail_new = fail;
    }

    pub fn set_fail_delete(&self, fail: bool) {
        self.state.lock().unwrap().fail_delete = fail;
    }
}

#[async_trait]
impl DeviceStore for MockDeviceStore {
    async fn new_device(&self) -> EngineResult<Device> {
        let mut state = self.state.lock().unwrap();
        if state.fail_new {
            return Err(EngineError::Store("datastore unavailable".to_string()));
        }
        state.next_registration_id += 1;
        let device = Device::new(state.next_registration_id);
        state.created.push(device.clone());
        Ok(device)
    }

    async fn delete_device(&self, device: &Device) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.fail_delete {
            return Err(EngineError::Store("delete failed".to_string()));
        }
        state.deleted.push(device.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::message::Message;

    fn options() -> ClientOptions {
        ClientOptions {
            props: DeviceProps {
                os: "Chrome".to_string(),
                platform_type: PlatformType::Chrome,
                version: AppVersion::default(),
                require_full_sync: false,
            },
            proxy_url: None,
            auto_reconnect: true,
            auto_trust_identity: true,
        }
    }

    #[tokio::test]
    async fn test_engine_remembers_clients() {
        let engine = MockEngine::new();
        engine.new_client(Device::new(1), &options()).unwrap();
        engine.new_client(Device::new(2), &options()).unwrap();

        let clients = engine.clients();
        assert_eq!(clients.len(), 2);
        assert_eq!(clients[1].device().registration_id, 2);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let client = MockClient::new(Device::new(1), options());
        let msg = OutboundMessage::new(
            Jid::user("1"),
            Message::Text {
                body: "hi".to_string(),
            },
        );

        assert_eq!(
            client.send_message(&msg).await,
            Err(EngineError::NotConnected)
        );

        client.set_online();
        client.send_message(&msg).await.unwrap();
        assert_eq!(client.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_handle_integrity() {
        let client = MockClient::new(Device::new(1), options());
        let handle = client.upload(b"abc", MediaCategory::Image).await.unwrap();

        assert_eq!(handle.file_length, 3);
        assert_eq!(handle.file_sha256, Sha256::digest(b"abc").to_vec());
        assert_eq!(handle.media_key.len(), 32);
        assert!(handle.url.ends_with(&handle.direct_path));
    }

    #[tokio::test]
    async fn test_scripted_pairing_assigns_identity() {
        let client = MockClient::new(Device::new(1), options());
        client.script_pairing(vec![
            PairingEvent::Code {
                code: "ref".to_string(),
                timeout: Duration::from_secs(20),
            },
            PairingEvent::Success,
        ]);

        let mut events = client.pairing_events().await.unwrap();
        client.connect().await.unwrap();

        assert!(matches!(events.recv().await, Some(PairingEvent::Code { .. })));
        assert_eq!(events.recv().await, Some(PairingEvent::Success));
        assert_eq!(events.recv().await, None);
        assert!(client.has_identity());
        assert!(client.is_logged_in());
    }

    #[tokio::test]
    async fn test_lookup_reports_unregistered() {
        let client = MockClient::new(Device::new(1), options());
        client.register("628111");

        let infos = client
            .is_on_network(&["+628111".to_string(), "+628222".to_string()])
            .await
            .unwrap();

        assert!(infos[0].registered);
        assert!(!infos[1].registered);
    }

    #[tokio::test]
    async fn test_store_delete_failure() {
        let store = MockDeviceStore::new();
        let device = store.new_device().await.unwrap();
        assert_eq!(device.registration_id, 1);

        store.set_fail_delete(true);
        assert!(store.delete_device(&device).await.is_err());
        assert!(store.deleted().is_empty());
    }
}
