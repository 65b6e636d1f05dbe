//! Instance state: props, methods, data, computed values and watchers.

use serde_json::Value;

use crate::debug::{handle_error, invoke_with_error_handling};
use crate::instance::{ComponentInstance, InstanceRef};
use crate::options::{hyphenate, PropOptions, Record, WatchCallback, WatchHandler};

pub fn init_state(vm: &InstanceRef) {
    init_props(&mut vm.borrow_mut());
    init_methods(&mut vm.borrow_mut());
    init_data(vm);
    init_computed(vm);
    init_watch(&mut vm.borrow_mut());
}

fn init_props(vm: &mut ComponentInstance) {
    let declared = vm.options.props();
    let props_data = vm.options.props_data.clone().unwrap_or_default();
    let mut props = Record::new();
    for (key, opts) in declared {
        let passed = props_data
            .get(&key)
            .or_else(|| props_data.get(&hyphenate(&key)))
            .cloned();
        let value = validate_prop(vm, &key, &opts, passed);
        props.insert(key, value);
    }
    vm.props = props;
}

fn validate_prop(
    vm: &ComponentInstance,
    key: &str,
    opts: &PropOptions,
    passed: Option<Value>,
) -> Value {
    let Some(value) = passed else {
        if opts.required {
            vm.warn(&format!("Missing required prop: \"{}\"", key));
        }
        return opts.default.clone().unwrap_or(Value::Null);
    };
    if !value.is_null() && !opts.types.is_empty() && !opts.types.iter().any(|ty| ty.matches(&value)) {
        let expected: Vec<String> = opts.types.iter().map(|ty| format!("{:?}", ty)).collect();
        vm.warn(&format!(
            "Invalid prop: type check failed for prop \"{}\". Expected {}, got {}",
            key,
            expected.join(", "),
            value_type_name(&value)
        ));
    }
    value
}

fn value_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "Null",
        Value::Bool(_) => "Boolean",
        Value::Number(_) => "Number",
        Value::String(_) => "String",
        Value::Array(_) => "Array",
        Value::Object(_) => "Object",
    }
}

fn init_methods(vm: &mut ComponentInstance) {
    let Some(methods) = vm.options.methods().cloned() else {
        return;
    };
    for key in methods.keys() {
        if vm.props.contains_key(key) {
            vm.warn(&format!("Method \"{}\" has already been defined as a prop.", key));
        }
    }
    vm.methods = methods;
}

fn init_data(vm: &InstanceRef) {
    let data = vm.borrow().options.data().cloned();
    let Some(data) = data else {
        return;
    };
    let Some(record) = invoke_with_error_handling(vm, "data()", |vm| data.evaluate(vm)) else {
        return;
    };
    let mut vm = vm.borrow_mut();
    for key in record.keys() {
        if vm.methods.contains_key(key) {
            vm.warn(&format!("Method \"{}\" has already been defined as a data property.", key));
        }
        if vm.props.contains_key(key) {
            vm.warn(&format!(
                "The data property \"{}\" is already declared as a prop. Use prop default value instead.",
                key
            ));
        }
    }
    vm.data = record;
}

fn init_computed(vm: &InstanceRef) {
    let computed = vm.borrow().options.computed().cloned();
    let Some(computed) = computed else {
        return;
    };
    for (key, getter) in computed.iter() {
        {
            let vm = vm.borrow();
            if vm.data.contains_key(key) || vm.props.contains_key(key) {
                vm.warn(&format!(
                    "The computed property \"{}\" is already defined in data or props.",
                    key
                ));
                continue;
            }
        }
        let info = format!("getter for computed property \"{}\"", key);
        if let Some(value) = invoke_with_error_handling(vm, &info, |vm| getter(&*vm)) {
            vm.borrow_mut().computed.insert(key.clone(), value);
        }
    }
}

fn init_watch(vm: &mut ComponentInstance) {
    let Some(watch) = vm.options.watch().cloned() else {
        return;
    };
    vm.watchers = watch;
    let immediate: Vec<(String, WatchHandler)> = vm
        .watchers
        .iter()
        .flat_map(|(key, handlers)| {
            handlers
                .iter()
                .filter(|handler| handler.immediate)
                .map(move |handler| (key.clone(), handler.clone()))
        })
        .collect();
    for (key, handler) in immediate {
        let value = vm.get(&key).unwrap_or(Value::Null);
        if let Err(err) = run_watcher(vm, &handler, &value, &Value::Null) {
            handle_error(&err, vm, &format!("callback for immediate watcher \"{}\"", key));
        }
    }
}

pub(crate) fn run_watcher(
    vm: &mut ComponentInstance,
    handler: &WatchHandler,
    value: &Value,
    old: &Value,
) -> Result<(), crate::error::HookError> {
    match &handler.callback {
        WatchCallback::Fn(callback) => callback(vm, value, old),
        WatchCallback::Method(method) => vm
            .call_method(method, &[value.clone(), old.clone()])
            .map(|_| ()),
    }
}
