//! Instance init sequence tests: hook order, error isolation, state wiring
//! and the child fast path.

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::{json, Value};

    use crate::config::Config;
    use crate::dom::{inner_html, Document};
    use crate::error::HookError;
    use crate::init::InstantiationKind;
    use crate::instance::InitPhase;
    use crate::merge::merge_invocations;
    use crate::options::{ComponentOptions, LifecycleHook, Record, WatchHandler};
    use crate::render::{RenderContext, RenderFn};
    use crate::runtime::Runtime;
    use crate::vnode::VNode;

    const PAGE: &str = r#"<!DOCTYPE html><html><head></head><body><div id="app"></div></body></html>"#;

    type Log = Rc<RefCell<Vec<String>>>;

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn record(value: Value) -> Record {
        value.as_object().cloned().unwrap_or_default()
    }

    fn setup(warnings: &Log, errors: &Log) -> (Runtime, Rc<Document>) {
        let warnings = warnings.clone();
        let errors = errors.clone();
        let config = Config::new()
            .with_warn_handler(move |msg, _vm, _trace| warnings.borrow_mut().push(msg.to_string()))
            .with_error_handler(move |err, _vm, info| {
                errors.borrow_mut().push(format!("{}: {}", info, err))
            });
        let doc = Rc::new(Document::parse(PAGE).unwrap());
        let rt = Runtime::new(config).with_dom(doc.clone());
        (rt, doc)
    }

    fn body_html(doc: &Document) -> String {
        doc.body().map(|body| inner_html(&body)).unwrap_or_default()
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // HOOK ORDER
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_created_runs_parent_first_even_when_parent_hook_fails() {
        let (warnings, errors, events) = (log(), log(), log());
        let (rt, doc) = setup(&warnings, &errors);

        let child_created = events.clone();
        let child_mounted = events.clone();
        rt.component(
            "child-item",
            ComponentOptions::new()
                .template("<span>child</span>")
                .on(LifecycleHook::Created, move |_| {
                    child_created.borrow_mut().push("child created".to_string());
                    Ok(())
                })
                .on(LifecycleHook::Mounted, move |_| {
                    child_mounted.borrow_mut().push("child mounted".to_string());
                    Ok(())
                }),
        )
        .unwrap();

        let parent_created = events.clone();
        let parent_mounted = events.clone();
        let root = rt
            .create_root(
                ComponentOptions::new()
                    .template("<div><child-item></child-item></div>")
                    .on(LifecycleHook::Created, move |_| {
                        parent_created.borrow_mut().push("parent created".to_string());
                        Err(HookError::new("parent boom"))
                    })
                    .on(LifecycleHook::Mounted, move |_| {
                        parent_mounted.borrow_mut().push("parent mounted".to_string());
                        Ok(())
                    }),
            )
            .unwrap();
        assert_eq!(root.borrow().phase(), InitPhase::Created);

        rt.mount(&root, Some("#app".into()), false).unwrap();

        assert_eq!(
            *events.borrow(),
            vec!["parent created", "child created", "child mounted", "parent mounted"]
        );
        assert_eq!(*errors.borrow(), vec!["created hook: parent boom"]);
        assert!(root.borrow().is_mounted());
        assert_eq!(root.borrow().children().len(), 1);
        assert!(body_html(&doc).contains("<div><span>child</span></div>"));
    }

    #[test]
    fn test_state_is_ready_by_created_but_not_before_create() {
        let (warnings, errors, seen) = (log(), log(), log());
        let (rt, _doc) = setup(&warnings, &errors);

        let before = seen.clone();
        let after = seen.clone();
        let vm = rt
            .create_root(
                ComponentOptions::new()
                    .data(|_| Ok(record(json!({ "msg": "hi" }))))
                    .computed("shout", |vm| {
                        let msg = vm.data().get("msg").and_then(Value::as_str).unwrap_or_default();
                        Ok(json!(msg.to_uppercase()))
                    })
                    .on(LifecycleHook::BeforeCreate, move |vm| {
                        before
                            .borrow_mut()
                            .push(format!("beforeCreate has msg: {}", vm.has("msg")));
                        Ok(())
                    })
                    .on(LifecycleHook::Created, move |vm| {
                        after.borrow_mut().push(format!(
                            "created has msg: {}, shout: {}",
                            vm.has("msg"),
                            vm.get("shout").unwrap_or(Value::Null)
                        ));
                        Ok(())
                    }),
            )
            .unwrap();

        assert_eq!(
            *seen.borrow(),
            vec!["beforeCreate has msg: false", "created has msg: true, shout: \"HI\""]
        );
        assert!(!vm.borrow().is_observable());
        assert!(vm.borrow().self_ref().is_some_and(|me| Rc::ptr_eq(&me, &vm)));
        assert!(errors.borrow().is_empty());
    }

    #[test]
    fn test_uids_are_distinct() {
        let (warnings, errors) = (log(), log());
        let (rt, _doc) = setup(&warnings, &errors);
        let a = rt.create_root(ComponentOptions::new()).unwrap();
        let b = rt.create_root(ComponentOptions::new()).unwrap();
        assert_ne!(a.borrow().uid(), b.borrow().uid());
    }

    #[test]
    fn test_second_initialize_is_a_warned_no_op() {
        let (warnings, errors, calls) = (log(), log(), log());
        let (rt, _doc) = setup(&warnings, &errors);

        let created = calls.clone();
        let vm = rt
            .create_root(ComponentOptions::new().on(LifecycleHook::Created, move |_| {
                created.borrow_mut().push("created".to_string());
                Ok(())
            }))
            .unwrap();
        let uid = vm.borrow().uid();

        rt.initialize(&vm, InstantiationKind::Root(ComponentOptions::new()))
            .unwrap();

        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(vm.borrow().uid(), uid);
        assert!(warnings
            .borrow()
            .iter()
            .any(|w| w.contains("already initialized")));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // ERROR ISOLATION
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_failing_data_and_computed_do_not_abort_init() {
        let (warnings, errors, calls) = (log(), log(), log());
        let (rt, _doc) = setup(&warnings, &errors);

        let created = calls.clone();
        let vm = rt
            .create_root(
                ComponentOptions::new()
                    .data(|_| Err(HookError::new("no data today")))
                    .computed("broken", |_| Err(HookError::new("bad getter")))
                    .on(LifecycleHook::Created, move |_| {
                        created.borrow_mut().push("created".to_string());
                        Ok(())
                    }),
            )
            .unwrap();

        assert_eq!(*calls.borrow(), vec!["created"]);
        assert_eq!(
            *errors.borrow(),
            vec![
                "data(): no data today",
                "getter for computed property \"broken\": bad getter"
            ]
        );
        assert!(vm.borrow().data().is_empty());
        assert_eq!(vm.borrow().phase(), InitPhase::Created);
    }

    #[test]
    fn test_error_captured_stops_propagation() {
        let (warnings, errors, captured) = (log(), log(), log());
        let (rt, _doc) = setup(&warnings, &errors);

        rt.component(
            "fragile-child",
            ComponentOptions::new()
                .template("<i>x</i>")
                .on(LifecycleHook::Created, |_| Err(HookError::new("child boom"))),
        )
        .unwrap();

        let sink = captured.clone();
        let root = rt
            .create_root(
                ComponentOptions::new()
                    .template("<div><fragile-child></fragile-child></div>")
                    .error_captured(move |_vm, err, info| {
                        sink.borrow_mut().push(format!("{}: {}", info, err));
                        false
                    }),
            )
            .unwrap();
        rt.mount(&root, Some("#app".into()), false).unwrap();

        assert_eq!(*captured.borrow(), vec!["created hook: child boom"]);
        assert!(errors.borrow().is_empty());
        assert!(root.borrow().is_mounted());
    }

    #[test]
    fn test_static_render_error_reaches_error_handler() {
        let (warnings, errors) = (log(), log());
        let (rt, _doc) = setup(&warnings, &errors);

        let failing: RenderFn = Rc::new(|_: &dyn RenderContext| Err(HookError::new("static boom")));
        let mut definition = ComponentOptions::new().render(|ctx| {
            Ok(VNode::element("div", vec![], vec![ctx.render_static(0)]))
        });
        definition.static_render_fns = Some(Rc::new(vec![failing]));

        let root = rt.create_root(definition).unwrap();
        rt.mount(&root, Some("#app".into()), false).unwrap();

        assert_eq!(*errors.borrow(), vec!["render: static boom"]);
        assert!(root.borrow().is_mounted());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // WATCHERS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_watchers_from_mixin_and_definition_both_fire_in_order() {
        let (warnings, errors, calls) = (log(), log(), log());
        let (rt, _doc) = setup(&warnings, &errors);

        let from_mixin = calls.clone();
        let from_own = calls.clone();
        let mixin = ComponentOptions::new().watch(
            "count",
            WatchHandler::from_fn(move |_vm, new, old| {
                from_mixin.borrow_mut().push(format!("mixin {} -> {}", old, new));
                Ok(())
            }),
        );
        let vm = rt
            .create_root(
                ComponentOptions::new()
                    .mixin(mixin)
                    .data(|_| Ok(record(json!({ "count": 1 }))))
                    .watch(
                        "count",
                        WatchHandler::from_fn(move |_vm, new, old| {
                            from_own.borrow_mut().push(format!("own {} -> {}", old, new));
                            Ok(())
                        }),
                    ),
            )
            .unwrap();

        assert_eq!(vm.borrow().watcher_count("count"), 2);
        assert!(vm.borrow_mut().set("count", json!(2)));
        assert_eq!(*calls.borrow(), vec!["mixin 1 -> 2", "own 1 -> 2"]);
    }

    #[test]
    fn test_immediate_watcher_fires_during_init() {
        let (warnings, errors, calls) = (log(), log(), log());
        let (rt, _doc) = setup(&warnings, &errors);

        let sink = calls.clone();
        rt.create_root(
            ComponentOptions::new()
                .data(|_| Ok(record(json!({ "query": "rust" }))))
                .watch(
                    "query",
                    WatchHandler::from_fn(move |_vm, new, old| {
                        sink.borrow_mut().push(format!("{} from {}", new, old));
                        Ok(())
                    })
                    .immediate(),
                ),
        )
        .unwrap();

        assert_eq!(*calls.borrow(), vec!["\"rust\" from null"]);
    }

    #[test]
    fn test_method_watcher_and_undeclared_set() {
        let (warnings, errors, calls) = (log(), log(), log());
        let (rt, _doc) = setup(&warnings, &errors);

        let sink = calls.clone();
        let vm = rt
            .create_root(
                ComponentOptions::new()
                    .data(|_| Ok(record(json!({ "n": 0 }))))
                    .method("onN", move |_vm, args| {
                        sink.borrow_mut().push(format!("onN {}", args[0]));
                        Ok(Value::Null)
                    })
                    .watch("n", WatchHandler::method("onN")),
            )
            .unwrap();

        assert!(vm.borrow_mut().set("n", json!(5)));
        assert!(!vm.borrow_mut().set("ghost", json!(1)));
        assert_eq!(*calls.borrow(), vec!["onN 5"]);
        assert!(warnings
            .borrow()
            .iter()
            .any(|w| w.contains("Cannot set reactive property \"ghost\"")));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // CHILD FAST PATH
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_child_fast_path_copies_vnode_fields_without_merging() {
        let (warnings, errors, pinged) = (log(), log(), log());
        let (rt, doc) = setup(&warnings, &errors);

        let child_cls = rt
            .component(
                "todo-item",
                ComponentOptions::new()
                    .props(["title"])
                    .template("<li>{{ title }}</li>"),
            )
            .unwrap();

        let sink = pinged.clone();
        let root = rt
            .create_root(
                ComponentOptions::new()
                    .template(r#"<ul><todo-item :title="heading" @ping="onPing"></todo-item></ul>"#)
                    .data(|_| Ok(record(json!({ "heading": "Buy milk" }))))
                    .method("onPing", move |_vm, args| {
                        sink.borrow_mut().push(format!("ping {}", args.len()));
                        Ok(Value::Null)
                    }),
            )
            .unwrap();

        // Settle the class against the current base first; the mount itself
        // must not merge anything.
        rt.resolve_constructor_options(&child_cls).unwrap();
        let before = merge_invocations();
        rt.mount(&root, Some("#app".into()), false).unwrap();
        assert_eq!(merge_invocations(), before);

        let child = root.borrow().children()[0].clone();
        {
            let child = child.borrow();
            assert_eq!(child.props().get("title"), Some(&json!("Buy milk")));
            let proto = child.options().proto().cloned().unwrap();
            assert!(Rc::ptr_eq(&proto, &child_cls.options()));
            assert_eq!(child.options().component_tag.as_deref(), Some("todo-item"));
            assert!(child.has_listeners("ping"));
            assert!(child.parent().is_some_and(|parent| Rc::ptr_eq(&parent, &root)));
            assert!(child.is_mounted());
        }

        child.borrow_mut().emit("ping", &[json!(1)]);
        assert_eq!(*pinged.borrow(), vec!["ping 1"]);
        assert!(body_html(&doc).contains("<ul><li>Buy milk</li></ul>"));
        assert!(errors.borrow().is_empty());
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // INJECTION
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_injections_resolve_from_ancestors_with_defaults() {
        let (warnings, errors) = (log(), log());
        let (rt, doc) = setup(&warnings, &errors);

        rt.component(
            "themed-label",
            ComponentOptions::new()
                .inject(["theme", "missing"])
                .inject_from("size", "size", Some(json!(3)))
                .template("<span>{{ theme }}</span>"),
        )
        .unwrap();

        let root = rt
            .create_root(
                ComponentOptions::new()
                    .data(|_| Ok(record(json!({ "mode": "dark" }))))
                    .provide(|vm| Ok(record(json!({ "theme": vm.get("mode") }))))
                    .template("<div><themed-label></themed-label></div>"),
            )
            .unwrap();
        assert_eq!(root.borrow().provided().get("theme"), Some(&json!("dark")));

        rt.mount(&root, Some("#app".into()), false).unwrap();

        let child = root.borrow().children()[0].clone();
        let child = child.borrow();
        assert_eq!(child.injected().get("theme"), Some(&json!("dark")));
        assert_eq!(child.injected().get("size"), Some(&json!(3)));
        assert!(!child.injected().contains_key("missing"));
        assert!(warnings
            .borrow()
            .iter()
            .any(|w| w == "Injection \"missing\" not found"));
        assert!(body_html(&doc).contains("<span>dark</span>"));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // PERFORMANCE MARKS
    // ═══════════════════════════════════════════════════════════════════════════════

    #[test]
    fn test_performance_measures_init_and_compile() {
        let config = Config::from_json(r#"{ "performance": true, "silent": true }"#).unwrap();
        let doc = Rc::new(Document::parse(PAGE).unwrap());
        let rt = Runtime::new(config).with_dom(doc);

        let root = rt
            .create_root(ComponentOptions::new().template("<p>measured</p>"))
            .unwrap();
        rt.mount(&root, Some("#app".into()), false).unwrap();

        let names: Vec<String> = rt.measures().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["<Root> init", "<Root> compile"]);
    }
}
