//! In-memory `Engine` used by unit tests.
//!
//! Models are dangling handles, error objects are boxed `MockError`s, and
//! every native entry point bumps a counter and records its arguments so
//! tests can assert on what reached the boundary.

use std::cell::{Cell, RefCell};
use std::ffi::{c_void, CStr};
use std::os::raw::c_int;
use std::ptr::NonNull;

use crate::native::{
    Engine, ErrorPtr, ErrorSlot, LaplaceCall, ModelPtr, OptimizeCall, PathfinderCall,
    PrintCallback, SampleCall,
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Counters {
    pub models_created: usize,
    pub models_destroyed: usize,
    pub errors_created: usize,
    pub errors_freed: usize,
    pub print_callbacks: usize,
    pub native_calls: usize,
}

/// Arguments observed by the most recent algorithm call.
#[derive(Debug, Default, Clone, PartialEq)]
pub(crate) struct LastCall {
    pub units: usize,
    pub seed: u32,
    pub inits: Option<String>,
    pub out_len: usize,
    pub metric_in: Option<Vec<f64>>,
    pub metric_out_len: Option<usize>,
    pub theta_hat: Option<Vec<f64>>,
    pub theta_json: Option<String>,
    pub hessian_len: Option<usize>,
}

struct MockError {
    category: c_int,
    message: String,
}

pub(crate) struct MockEngine {
    param_names: String,
    free_params: usize,
    separator: u8,
    counters: Cell<Counters>,
    construction_error: RefCell<Option<Option<(c_int, String)>>>,
    call_failure: RefCell<Option<(c_int, Option<(c_int, String)>)>>,
    last_call: RefCell<LastCall>,
}

impl MockEngine {
    pub fn new(param_names: &str, free_params: usize) -> MockEngine {
        MockEngine {
            param_names: param_names.to_string(),
            free_params,
            separator: b'\x1c',
            counters: Cell::new(Counters::default()),
            construction_error: RefCell::new(None),
            call_failure: RefCell::new(None),
            last_call: RefCell::new(LastCall::default()),
        }
    }

    /// Make the constructor fail, with an error object when `error` is set.
    pub fn fail_construction(&self, error: Option<(c_int, &str)>) {
        *self.construction_error.borrow_mut() = Some(error.map(|(c, m)| (c, m.to_string())));
    }

    /// Make every algorithm call return `code`, with an error object when
    /// `error` is set.
    pub fn fail_calls(&self, code: c_int, error: Option<(c_int, &str)>) {
        *self.call_failure.borrow_mut() = Some((code, error.map(|(c, m)| (c, m.to_string()))));
    }

    pub fn counters(&self) -> Counters {
        self.counters.get()
    }

    pub fn last_call(&self) -> LastCall {
        self.last_call.borrow().clone()
    }

    pub fn make_error(&self, category: c_int, message: &str) -> ErrorPtr {
        self.bump(|c| c.errors_created += 1);
        let boxed = Box::new(MockError { category, message: message.to_string() });
        ErrorPtr::new(NonNull::from(Box::leak(boxed)).cast::<c_void>())
    }

    fn bump(&self, update: impl FnOnce(&mut Counters)) {
        let mut counters = self.counters.get();
        update(&mut counters);
        self.counters.set(counters);
    }

    fn finish(&self, out: &mut [f64], err: &mut ErrorSlot) -> c_int {
        self.bump(|c| c.native_calls += 1);
        for (i, value) in out.iter_mut().enumerate() {
            *value = i as f64;
        }
        match self.call_failure.borrow().clone() {
            None => 0,
            Some((code, error)) => {
                if let Some((category, message)) = error {
                    err.set(self.make_error(category, &message));
                }
                code
            }
        }
    }

    fn mock_error(err: &ErrorPtr) -> &MockError {
        // SAFETY: every `ErrorPtr` handed out by this engine points to a
        // leaked `MockError` that is only reclaimed by `free_error`.
        unsafe { &*(err.as_ptr() as *const MockError) }
    }
}

fn owned(value: Option<&CStr>) -> Option<String> {
    value.map(|s| s.to_string_lossy().into_owned())
}

impl Engine for MockEngine {
    fn create_model(&self, _data: &CStr, _seed: u32, err: &mut ErrorSlot) -> Option<ModelPtr> {
        if let Some(error) = self.construction_error.borrow().clone() {
            if let Some((category, message)) = error {
                err.set(self.make_error(category, &message));
            }
            return None;
        }
        self.bump(|c| c.models_created += 1);
        Some(ModelPtr::new(NonNull::dangling()))
    }

    fn destroy_model(&self, _model: ModelPtr) {
        self.bump(|c| c.models_destroyed += 1);
    }

    fn param_names(&self, _model: &ModelPtr) -> String {
        self.param_names.clone()
    }

    fn num_free_params(&self, _model: &ModelPtr) -> usize {
        self.free_params
    }

    fn sample(&self, _model: &ModelPtr, call: SampleCall<'_>, err: &mut ErrorSlot) -> c_int {
        *self.last_call.borrow_mut() = LastCall {
            units: call.num_chains,
            seed: call.seed,
            inits: owned(call.inits),
            out_len: call.out.len(),
            metric_in: call.init_inv_metric.map(<[f64]>::to_vec),
            metric_out_len: call.metric_out.as_ref().map(|m| m.len()),
            ..LastCall::default()
        };
        self.finish(call.out, err)
    }

    fn pathfinder(
        &self, _model: &ModelPtr, call: PathfinderCall<'_>, err: &mut ErrorSlot,
    ) -> c_int {
        *self.last_call.borrow_mut() = LastCall {
            units: call.num_paths,
            seed: call.seed,
            inits: owned(call.inits),
            out_len: call.out.len(),
            ..LastCall::default()
        };
        self.finish(call.out, err)
    }

    fn optimize(&self, _model: &ModelPtr, call: OptimizeCall<'_>, err: &mut ErrorSlot) -> c_int {
        *self.last_call.borrow_mut() = LastCall {
            units: 1,
            seed: call.seed,
            inits: owned(call.inits),
            out_len: call.out.len(),
            ..LastCall::default()
        };
        self.finish(call.out, err)
    }

    fn laplace_sample(
        &self, _model: &ModelPtr, call: LaplaceCall<'_>, err: &mut ErrorSlot,
    ) -> c_int {
        *self.last_call.borrow_mut() = LastCall {
            units: 1,
            seed: call.seed,
            out_len: call.out.len(),
            theta_hat: call.theta_hat.map(<[f64]>::to_vec),
            theta_json: owned(call.theta_json),
            hessian_len: call.hessian_out.as_ref().map(|h| h.len()),
            ..LastCall::default()
        };
        self.finish(call.out, err)
    }

    fn error_message(&self, err: &ErrorPtr) -> String {
        MockEngine::mock_error(err).message.clone()
    }

    fn error_type(&self, err: &ErrorPtr) -> c_int {
        MockEngine::mock_error(err).category
    }

    fn free_error(&self, err: ErrorPtr) {
        self.bump(|c| c.errors_freed += 1);
        // SAFETY: see `mock_error`; the handle is consumed here.
        drop(unsafe { Box::from_raw(err.as_ptr() as *mut MockError) });
    }

    fn separator(&self) -> u8 {
        self.separator
    }

    fn api_version(&self) -> (i32, i32, i32) {
        (0, 1, 0)
    }

    fn set_print_callback(&self, _callback: PrintCallback) {
        self.bump(|c| c.print_callbacks += 1);
    }
}
