// web-server/src/test_support.rs
//! Portal wired to a canned canister for handler tests.
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use actix::{Actor, Addr};
use actix_web::cookie::Cookie;
use actix_web::dev::ServiceResponse;
use actix_web::http::header;
use actix_web::web;
use async_trait::async_trait;
use candid::utils::ArgumentDecoder;
use candid::{CandidType, Principal};
use common::models::identity::StoredIdentity;
use common::StaticFilesConfig;
use ic_agent::identity::Secp256k1Identity;
use tempfile::TempDir;
use url::Url;
use vts_client::{
    delegate, BootstrapSettings, CallKind, ClientError, ClientFactory, RouteGuard, SessionBootstrap, Transport,
    TransportError, Vehicle, VtsClient, VtsError, VtsResult,
};

use crate::auth::encode_delegation;
use crate::client_registry::{ClientRegistryActor, RegistryIdentityStore};
use crate::middleware::session_guard::SESSION_COOKIE_NAME;

pub const INDEX_HTML: &str = "<!doctype html><div id=\"app\"></div>";

/// Answers each method with a fixed encoded reply and counts calls
#[derive(Default)]
pub struct CannedTransport {
    replies: HashMap<String, Vec<u8>>,
    calls: Mutex<Vec<(CallKind, String, Vec<u8>)>>,
}

impl CannedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply<T: CandidType>(mut self, method: &str, value: T) -> Self {
        let bytes = candid::encode_one(value).expect("encode canned reply");
        self.replies.insert(method.to_string(), bytes);
        self
    }

    pub fn reply_ok<T: CandidType>(self, method: &str, value: T) -> Self {
        self.reply(method, VtsResult::<T>::Ok(value))
    }

    /// `T` is the success type the method declares
    pub fn reply_err<T: CandidType>(self, method: &str, error: VtsError) -> Self {
        self.reply(method, VtsResult::<T>::Err(error))
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(_, m, _)| m == method).count()
    }

    /// Arguments of the latest call to `method`, decoded with the declared types
    pub fn last_args<T>(&self, method: &str) -> T
    where
        T: for<'a> ArgumentDecoder<'a>,
    {
        let calls = self.calls.lock().unwrap();
        let (_, _, arg) = calls
            .iter()
            .rev()
            .find(|(_, m, _)| m == method)
            .unwrap_or_else(|| panic!("{} was never called", method));
        candid::decode_args(arg).unwrap_or_else(|e| panic!("{} sent undecodable arguments: {}", method, e))
    }
}

#[async_trait]
impl Transport for CannedTransport {
    async fn call(
        &self,
        kind: CallKind,
        _canister_id: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        self.calls.lock().unwrap().push((kind, method.to_string(), arg));
        self.replies
            .get(method)
            .cloned()
            .ok_or_else(|| TransportError::Unavailable(format!("no canned reply for {}", method)))
    }
}

struct CannedFactory(Arc<CannedTransport>);

impl ClientFactory for CannedFactory {
    fn client_for(&self, _identity: &StoredIdentity) -> Result<VtsClient, ClientError> {
        Ok(VtsClient::new(Principal::anonymous(), self.0.clone()))
    }
}

pub fn vehicle(on_off: bool) -> Vehicle {
    Vehicle {
        owner: Principal::anonymous(),
        public_key: vec![2; 33],
        arch: "aarch64".to_string(),
        firmware: vec![0x50, 0x4B, 0x03, 0x04],
        agreement: Some(1),
        on_off,
        telemetry: BTreeMap::new(),
        accumulated_telemetry: BTreeMap::new(),
    }
}

pub struct TestPortal {
    pub registry: Addr<ClientRegistryActor>,
    pub guard: RouteGuard<RegistryIdentityStore>,
    pub transport: Arc<CannedTransport>,
    pub static_files: StaticFilesConfig,
    _static_dir: TempDir,
}

impl TestPortal {
    /// Must run inside an actix system; the registry actor is started here
    pub fn new(transport: CannedTransport) -> Self {
        let registry = ClientRegistryActor::new().start();
        let settings = BootstrapSettings {
            identity_provider: Url::parse("http://identity.localhost:7777").unwrap(),
            callback_url: "http://127.0.0.1:8081/auth/callback".to_string(),
            state_secret: "test_secret".to_string(),
            login_timeout: Duration::from_secs(60),
            identity_ttl_secs: 3600,
            max_pending_logins: 64,
        };
        let store = RegistryIdentityStore::new(registry.clone());
        let guard = RouteGuard::new(Arc::new(SessionBootstrap::new(store, settings)));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), INDEX_HTML).unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets").join("app.js"), "console.log('vts')").unwrap();
        let static_files = StaticFilesConfig {
            path: dir.path().to_string_lossy().into_owned(),
            ..StaticFilesConfig::default()
        };

        Self {
            registry,
            guard,
            transport: Arc::new(transport),
            static_files,
            _static_dir: dir,
        }
    }

    pub fn clients(&self) -> web::Data<dyn ClientFactory> {
        let factory: Arc<dyn ClientFactory> = Arc::new(CannedFactory(self.transport.clone()));
        web::Data::from(factory)
    }
}

pub fn location<B>(res: &ServiceResponse<B>) -> String {
    res.headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub fn session_cookie<B>(res: &ServiceResponse<B>) -> Cookie<'static> {
    res.response()
        .cookies()
        .find(|c| c.name() == SESSION_COOKIE_NAME)
        .expect("session cookie issued")
        .into_owned()
}

/// The user every test login approves as
pub fn user() -> Secp256k1Identity {
    Secp256k1Identity::from_private_key(k256::SecretKey::from_slice(&[5; 32]).unwrap())
}

/// Callback the identity provider sends the browser to once `user` approved
/// the login behind the provider redirect `location`
pub fn callback_uri(location: &str, user: &Secp256k1Identity) -> String {
    let url = Url::parse(location).unwrap();
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap_or_else(|| panic!("redirect carries no {}", name))
    };
    let session_key = hex::decode(param("session_public_key")).unwrap();
    let expiration = (chrono::Utc::now() + chrono::Duration::hours(1)).timestamp_nanos_opt().unwrap() as u64;
    let chain = delegate(user, &session_key, expiration).unwrap();
    format!(
        "/auth/callback?state={}&delegation={}",
        param("state"),
        encode_delegation(&chain).unwrap()
    )
}

/// `state` parameter of an identity provider redirect
pub fn login_state(location: &str) -> String {
    Url::parse(location)
        .unwrap()
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .expect("redirect carries a login state")
}

/// Initialise the portal app exactly as `main` assembles it
macro_rules! init_portal {
    ($portal:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .wrap($crate::middleware::session_guard::SessionGuard::new(
                    $portal.guard.clone(),
                    $portal.registry.clone(),
                    false,
                    3600,
                ))
                .app_data(actix_web::web::Data::new($portal.guard.clone()))
                .app_data(actix_web::web::Data::new($portal.registry.clone()))
                .app_data($portal.clients())
                .configure(|cfg| $crate::routing::configure(cfg, &$portal.static_files)),
        )
        .await
    };
}

/// Run the redirect and callback round trip for `path`; yields the session cookie
macro_rules! login {
    ($app:expr, $path:expr) => {{
        let res = actix_web::test::call_service(
            &$app,
            actix_web::test::TestRequest::get().uri($path).to_request(),
        )
        .await;
        assert_eq!(res.status(), actix_web::http::StatusCode::FOUND);
        let cookie = $crate::test_support::session_cookie(&res);
        let uri = $crate::test_support::callback_uri(
            &$crate::test_support::location(&res),
            &$crate::test_support::user(),
        );

        let res = actix_web::test::call_service(
            &$app,
            actix_web::test::TestRequest::get()
                .uri(&uri)
                .cookie(cookie.clone())
                .to_request(),
        )
        .await;
        assert_eq!(res.status(), actix_web::http::StatusCode::FOUND);
        assert_eq!($crate::test_support::location(&res), $path);
        cookie
    }};
}
