use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use candid::utils::ArgumentDecoder;
use candid::{CandidType, Principal};
use vts_client::{
    Agreement, AgreementConditions, AgreementState, CallKind, PrincipalSet, StoreTelemetryResponse,
    Transport, TransportError, Vehicle, VtsError, VtsResult,
};

/// In-memory stand-in for the VTS canister speaking candid over the `Transport` seam
#[derive(Default)]
pub struct MockCanister {
    pub calls: Mutex<Vec<(CallKind, String)>>,
    last_args: Mutex<HashMap<String, Vec<u8>>>,
    vehicles: Mutex<BTreeMap<Principal, Vehicle>>,
    agreements: Mutex<Vec<Agreement>>,
    firmware_requests: Mutex<BTreeSet<Principal>>,
    failures: Mutex<u32>,
    raw_replies: Mutex<HashMap<String, Vec<u8>>>,
}

pub fn caller() -> Principal {
    Principal::from_slice(&[7; 29])
}

pub fn vehicle_id(n: u8) -> Principal {
    Principal::from_slice(&[n; 29])
}

pub fn vehicle(on_off: bool) -> Vehicle {
    Vehicle {
        owner: caller(),
        public_key: vec![2; 33],
        arch: "aarch64".to_string(),
        firmware: vec![0x50, 0x4B, 0x03, 0x04],
        agreement: None,
        on_off,
        telemetry: BTreeMap::new(),
        accumulated_telemetry: BTreeMap::new(),
    }
}

fn args<T>(arg: &[u8]) -> T
where
    T: for<'a> ArgumentDecoder<'a>,
{
    candid::decode_args(arg).expect("mock received arguments that do not match the interface")
}

fn reply<T: CandidType>(value: T) -> Vec<u8> {
    candid::encode_one(value).expect("encode reply")
}

impl MockCanister {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vehicle(self, id: Principal, vehicle: Vehicle) -> Self {
        self.vehicles.lock().unwrap().insert(id, vehicle);
        self
    }

    /// Fail the next `n` calls at the transport level
    pub fn fail_next(&self, n: u32) {
        *self.failures.lock().unwrap() = n;
    }

    /// Answer `method` with raw bytes regardless of arguments
    pub fn raw_reply(&self, method: &str, bytes: Vec<u8>) {
        self.raw_replies.lock().unwrap().insert(method.to_string(), bytes);
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|(_, m)| m == method).count()
    }

    pub fn recorded_kind(&self, method: &str) -> Option<CallKind> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(_, m)| m == method)
            .map(|(kind, _)| *kind)
    }

    /// Encoded arguments of the latest call to `method`
    pub fn last_arg(&self, method: &str) -> Option<Vec<u8>> {
        self.last_args.lock().unwrap().get(method).cloned()
    }

    pub fn agreements(&self) -> Vec<Agreement> {
        self.agreements.lock().unwrap().clone()
    }

    fn dispatch(&self, method: &str, arg: &[u8]) -> Result<Vec<u8>, TransportError> {
        let bytes = match method {
            "get_vehicle" => {
                let (id,): (Principal,) = args(arg);
                let res: VtsResult<Vehicle> = self
                    .vehicles
                    .lock()
                    .unwrap()
                    .get(&id)
                    .cloned()
                    .ok_or(VtsError::NotFound);
                reply(res)
            }
            "create_agreement" => {
                let (name, vh_customer, gas_price): (String, Principal, String) = args(arg);
                let mut agreements = self.agreements.lock().unwrap();
                agreements.push(Agreement {
                    name,
                    vh_provider: caller(),
                    vh_customer,
                    state: AgreementState::Unsigned,
                    conditions: AgreementConditions { gas_price },
                    vehicles: PrincipalSet::new(),
                });
                reply(VtsResult::<u128>::Ok(agreements.len() as u128))
            }
            "sign_agreement" => {
                let (id,): (u128,) = args(arg);
                let mut agreements = self.agreements.lock().unwrap();
                let res = match id.checked_sub(1).and_then(|i| agreements.get_mut(i as usize)) {
                    Some(agreement) => {
                        agreement.state = AgreementState::Signed;
                        Ok(())
                    }
                    None => Err(VtsError::NotFound),
                };
                reply(res)
            }
            "link_vehicle" => {
                let (id, vehicle): (u128, Principal) = args(arg);
                let mut agreements = self.agreements.lock().unwrap();
                let res = match id.checked_sub(1).and_then(|i| agreements.get_mut(i as usize)) {
                    Some(agreement) if agreement.state == AgreementState::Signed => {
                        agreement.vehicles.insert(vehicle, ());
                        Ok(())
                    }
                    Some(_) => Err(VtsError::Unauthorized),
                    None => Err(VtsError::NotFound),
                };
                reply(res)
            }
            "get_user_agreements" => {
                let () = args(arg);
                reply(VtsResult::<Vec<Agreement>>::Ok(self.agreements()))
            }
            "request_firmware" => {
                let () = args(arg);
                let inserted = self.firmware_requests.lock().unwrap().insert(caller());
                reply(if inserted { Ok(()) } else { Err(VtsError::AlreadyExists) })
            }
            "upload_firmware" => {
                let (customer, public_key, arch, firmware): (Principal, Vec<u8>, String, Vec<u8>) = args(arg);
                self.firmware_requests.lock().unwrap().remove(&customer);
                let id = Principal::self_authenticating(&public_key);
                self.vehicles.lock().unwrap().insert(
                    id,
                    Vehicle {
                        owner: customer,
                        public_key,
                        arch,
                        firmware,
                        ..vehicle(false)
                    },
                );
                reply(VtsResult::<()>::Ok(()))
            }
            "store_telemetry" => {
                let (id, _data, signature): (Principal, Vec<u8>, Vec<u8>) = args(arg);
                let res = if signature.is_empty() {
                    Err(VtsError::InvalidSignatureFormat)
                } else {
                    match self.vehicles.lock().unwrap().get(&id) {
                        Some(v) if v.on_off => Ok(StoreTelemetryResponse::On),
                        Some(_) => Ok(StoreTelemetryResponse::Off),
                        None => Err(VtsError::NotFound),
                    }
                };
                reply(res)
            }
            "clean_state" => {
                let () = args(arg);
                self.vehicles.lock().unwrap().clear();
                self.agreements.lock().unwrap().clear();
                candid::encode_args(()).expect("encode empty reply")
            }
            other => {
                return Err(TransportError::Unavailable(format!("mock does not implement {}", other)));
            }
        };
        Ok(bytes)
    }
}

#[async_trait]
impl Transport for MockCanister {
    async fn call(
        &self,
        kind: CallKind,
        _canister_id: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        self.calls.lock().unwrap().push((kind, method.to_string()));
        self.last_args.lock().unwrap().insert(method.to_string(), arg.clone());

        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(TransportError::Unavailable("replica unreachable".to_string()));
            }
        }

        if let Some(bytes) = self.raw_replies.lock().unwrap().get(method) {
            return Ok(bytes.clone());
        }

        self.dispatch(method, &arg)
    }
}
