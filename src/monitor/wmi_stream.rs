//! WMI-backed process lifecycle event streams
//!
//! Implements [`EventStream`]/[`EventStreamFactory`] on top of
//! semisynchronous WMI notification queries:
//!
//! - **Trace mode**: `Win32_ProcessStartTrace` + `Win32_ProcessStopTrace`.
//!   High fidelity, but the queries are rejected with an access-denied
//!   status for non-elevated callers.
//! - **Instance mode**: `__InstanceCreationEvent` / `__InstanceDeletionEvent`
//!   polled `WITHIN 2` seconds over `Win32_Process`. Works without
//!   privileges at lower fidelity.
//!
//! All COM objects are created and polled on whichever thread calls
//! [`EventStreamFactory::open`] - the event worker thread. The apartment is
//! initialized once per thread and kept for the thread's lifetime, matching
//! the worker's ownership of every subscription handle.

#![cfg(windows)]

use crate::error::{HdrSyncError, Result};
use crate::monitor::event_watcher::{
    EventKind, EventStream, EventStreamFactory, RawProcessEvent, StreamMode,
};
use std::cell::Cell;
use std::time::Duration;
use windows::Win32::Foundation::{E_ACCESSDENIED, RPC_E_CHANGED_MODE};
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, COINIT_MULTITHREADED, CoCreateInstance, CoInitializeEx,
    CoSetProxyBlanket, EOAC_NONE, RPC_C_AUTHN_LEVEL_CALL, RPC_C_IMP_LEVEL_IMPERSONATE,
};
use windows::Win32::System::Wmi::{
    IEnumWbemClassObject, IWbemClassObject, IWbemLocator, IWbemServices, WBEM_E_ACCESS_DENIED,
    WBEM_FLAG_FORWARD_ONLY, WBEM_FLAG_RETURN_IMMEDIATELY, WbemLocator,
};
use windows::core::{BSTR, HRESULT, HSTRING, IUnknown, Interface, VARIANT};

/// Authentication service constants for `CoSetProxyBlanket`
const RPC_C_AUTHN_WINNT: u32 = 10;
const RPC_C_AUTHZ_NONE: u32 = 0;

/// Factory opening WMI notification queries on the calling thread
#[derive(Debug, Default)]
pub struct WmiStreamFactory;

impl WmiStreamFactory {
    /// Create a new WMI stream factory
    pub fn new() -> Self {
        Self
    }
}

impl EventStreamFactory for WmiStreamFactory {
    fn open(&mut self, mode: StreamMode) -> Result<Box<dyn EventStream>> {
        Ok(Box::new(WmiEventStream::open(mode)?))
    }
}

/// One active subscription: a pair of semisynchronous notification queries
struct WmiEventStream {
    mode: StreamMode,
    /// Keeps the namespace connection alive for the enumerators
    _services: IWbemServices,
    subscriptions: Vec<(EventKind, IEnumWbemClassObject)>,
}

impl WmiEventStream {
    fn open(mode: StreamMode) -> Result<Self> {
        ensure_com_initialized()?;
        let services = connect_cimv2()?;

        let queries: &[(EventKind, &str)] = match mode {
            StreamMode::Trace => &[
                (EventKind::Started, "SELECT * FROM Win32_ProcessStartTrace"),
                (EventKind::Stopped, "SELECT * FROM Win32_ProcessStopTrace"),
            ],
            StreamMode::Instance => &[
                (
                    EventKind::Started,
                    "SELECT * FROM __InstanceCreationEvent WITHIN 2 \
                     WHERE TargetInstance ISA 'Win32_Process'",
                ),
                (
                    EventKind::Stopped,
                    "SELECT * FROM __InstanceDeletionEvent WITHIN 2 \
                     WHERE TargetInstance ISA 'Win32_Process'",
                ),
            ],
        };

        let mut subscriptions = Vec::with_capacity(queries.len());
        for (kind, wql) in queries {
            subscriptions.push((*kind, exec_notification_query(&services, wql)?));
        }

        Ok(Self {
            mode,
            _services: services,
            subscriptions,
        })
    }

    /// Decode one event object into a raw event, leaving fields `None` when
    /// the payload lacks them
    fn decode(&self, kind: EventKind, object: &IWbemClassObject) -> RawProcessEvent {
        match self.mode {
            StreamMode::Trace => RawProcessEvent {
                kind,
                pid: get_u32(object, "ProcessID"),
                name: get_string(object, "ProcessName"),
            },
            StreamMode::Instance => match get_object(object, "TargetInstance") {
                Some(target) => RawProcessEvent {
                    kind,
                    pid: get_u32(&target, "ProcessId"),
                    name: get_string(&target, "Name"),
                },
                None => RawProcessEvent {
                    kind,
                    pid: None,
                    name: None,
                },
            },
        }
    }
}

impl EventStream for WmiEventStream {
    /// Poll each subscription, splitting the timeout between them
    ///
    /// # Safety
    ///
    /// `Next` is called with a one-element `Option<IWbemClassObject>` slice
    /// and a matching out-count; the object is only read when the out-count
    /// says one was returned. `WBEM_S_TIMEDOUT` and `WBEM_S_FALSE` are
    /// success codes and terminate the drain loop via the zero out-count.
    #[expect(
        unsafe_code,
        reason = "Windows FFI for IEnumWbemClassObject::Next semisynchronous polling"
    )]
    fn poll(&mut self, timeout: Duration) -> Result<Vec<RawProcessEvent>> {
        let mut events = Vec::new();
        #[expect(
            clippy::cast_possible_truncation,
            clippy::cast_possible_wrap,
            reason = "poll timeouts are far below i32::MAX milliseconds"
        )]
        let per_subscription =
            (timeout.as_millis() as i32 / self.subscriptions.len().max(1) as i32).max(10);

        for (kind, enumerator) in &self.subscriptions {
            let mut wait = per_subscription;
            loop {
                let mut objects: [Option<IWbemClassObject>; 1] = [None];
                let mut returned = 0u32;
                let hr: HRESULT =
                    unsafe { enumerator.Next(wait, &mut objects, &raw mut returned) };
                if hr.is_err() {
                    return Err(HdrSyncError::SubscriptionFailed(Box::new(
                        windows::core::Error::from_hresult(hr),
                    )));
                }
                if returned == 0 {
                    break;
                }
                if let Some(object) = objects[0].take() {
                    events.push(self.decode(*kind, &object));
                }
                // Something was ready; drain the rest without waiting
                wait = 0;
            }
        }

        Ok(events)
    }
}

thread_local! {
    static COM_READY: Cell<bool> = const { Cell::new(false) };
}

/// Initialize COM for the calling thread once; the apartment lives as long
/// as the thread does
///
/// # Safety
///
/// `CoInitializeEx` is called with no reserved pointer. A changed-mode
/// result means the thread already has an apartment, which is fine for the
/// semisynchronous calls used here.
#[expect(unsafe_code, reason = "Windows FFI for COM apartment initialization")]
fn ensure_com_initialized() -> Result<()> {
    COM_READY.with(|ready| {
        if ready.get() {
            return Ok(());
        }
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        // RPC_E_CHANGED_MODE: someone initialized an STA here first; usable
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            return Err(HdrSyncError::SubscriptionFailed(Box::new(
                windows::core::Error::from_hresult(hr),
            )));
        }
        ready.set(true);
        Ok(())
    })
}

/// Connect to the ROOT\CIMV2 namespace with call-level authentication
///
/// # Safety
///
/// All COM calls check their results; the locator and services proxies are
/// reference-counted wrappers released on drop.
#[expect(
    unsafe_code,
    reason = "Windows FFI for WMI locator creation and namespace connection"
)]
fn connect_cimv2() -> Result<IWbemServices> {
    unsafe {
        let locator: IWbemLocator = CoCreateInstance(&WbemLocator, None, CLSCTX_INPROC_SERVER)
            .map_err(classify_com_error)?;

        let services = locator
            .ConnectServer(
                &BSTR::from("ROOT\\CIMV2"),
                &BSTR::new(),
                &BSTR::new(),
                &BSTR::new(),
                0,
                &BSTR::new(),
                None,
            )
            .map_err(classify_com_error)?;

        CoSetProxyBlanket(
            &services,
            RPC_C_AUTHN_WINNT,
            RPC_C_AUTHZ_NONE,
            None,
            RPC_C_AUTHN_LEVEL_CALL,
            RPC_C_IMP_LEVEL_IMPERSONATE,
            None,
            EOAC_NONE,
        )
        .map_err(classify_com_error)?;

        Ok(services)
    }
}

/// Issue a forward-only, return-immediately notification query
///
/// # Safety
///
/// The query language and text are valid BSTRs for the duration of the call.
#[expect(unsafe_code, reason = "Windows FFI for ExecNotificationQuery")]
fn exec_notification_query(services: &IWbemServices, wql: &str) -> Result<IEnumWbemClassObject> {
    unsafe {
        services
            .ExecNotificationQuery(
                &BSTR::from("WQL"),
                &BSTR::from(wql),
                WBEM_FLAG_RETURN_IMMEDIATELY.0 | WBEM_FLAG_FORWARD_ONLY.0,
                None,
            )
            .map_err(classify_com_error)
    }
}

/// Map a COM error to the subscription taxonomy, recognizing both the plain
/// and the WMI-specific access-denied statuses
fn classify_com_error(error: windows::core::Error) -> HdrSyncError {
    if error.code() == E_ACCESSDENIED || error.code() == HRESULT(WBEM_E_ACCESS_DENIED.0) {
        HdrSyncError::SubscriptionDenied(error.to_string())
    } else {
        HdrSyncError::SubscriptionFailed(Box::new(error))
    }
}

/// Read one property as a VARIANT; `None` when absent
///
/// # Safety
///
/// The out-VARIANT is default-initialized and released by its Drop impl.
#[expect(unsafe_code, reason = "Windows FFI for IWbemClassObject::Get")]
fn get_variant(object: &IWbemClassObject, property: &str) -> Option<VARIANT> {
    let mut value = VARIANT::default();
    unsafe {
        object
            .Get(&HSTRING::from(property), 0, &mut value, None, None)
            .ok()?;
    }
    Some(value)
}

fn get_string(object: &IWbemClassObject, property: &str) -> Option<String> {
    let value = get_variant(object, property)?;
    BSTR::try_from(&value).ok().map(|b| b.to_string())
}

fn get_u32(object: &IWbemClassObject, property: &str) -> Option<u32> {
    let value = get_variant(object, property)?;
    u32::try_from(&value)
        .ok()
        .or_else(|| i32::try_from(&value).ok().and_then(|i| u32::try_from(i).ok()))
        .or_else(|| {
            BSTR::try_from(&value)
                .ok()
                .and_then(|b| b.to_string().parse().ok())
        })
}

/// Read an embedded object property (e.g. `TargetInstance`)
fn get_object(object: &IWbemClassObject, property: &str) -> Option<IWbemClassObject> {
    let value = get_variant(object, property)?;
    IUnknown::try_from(&value).ok()?.cast().ok()
}
