//! Mount adapter: resolves the target and template, compiles on demand, then
//! hands over to the configured [`crate::patch::Mounter`].

use crate::compiler::CompileConfig;
use crate::debug::format_component_name;
use crate::dom::{self, Handle};
use crate::error::Result;
use crate::instance::InstanceRef;
use crate::options::{MountTarget, TemplateOption};
use crate::runtime::Runtime;

const DOCUMENT_ROOT_WARNING: &str =
    "Do not mount components to <html> or <body> - mount to normal elements instead.";

/// Mounts `vm` onto `target`.
///
/// Targets that are the document element or body are refused with a warning
/// and the instance comes back unmounted. Instances that already carry a
/// render function skip compilation; otherwise the compiled render function is
/// stored on the instance's options so later mounts reuse it.
pub fn mount(
    rt: &Runtime,
    vm: &InstanceRef,
    target: Option<MountTarget>,
    hydrating: bool,
) -> Result<InstanceRef> {
    let el = target.and_then(|target| resolve_target(rt, vm, target));

    if let Some(el) = &el {
        if dom::is_document_root(el) {
            vm.borrow().warn(DOCUMENT_ROOT_WARNING);
            return Ok(vm.clone());
        }
    }

    let needs_compile = vm.borrow().options.render().is_none();
    if needs_compile {
        let Some(template) = resolve_template(rt, vm, el.as_ref()) else {
            return Ok(vm.clone());
        };
        if !template.is_empty() {
            compile_into(rt, vm, &template);
        }
    }

    rt.mounter().mount(rt, vm, el, hydrating)
}

fn resolve_target(rt: &Runtime, vm: &InstanceRef, target: MountTarget) -> Option<Handle> {
    match target {
        MountTarget::Node(node) => Some(node),
        MountTarget::Selector(selector) => {
            let found = rt.dom().and_then(|dom| dom.query(&selector));
            if found.is_none() {
                vm.borrow()
                    .warn(&format!("Cannot find element: {}", selector));
            }
            found
        }
    }
}

/// Markup to compile. `None` means mounting must stop; an empty string means
/// there is nothing to compile.
fn resolve_template(rt: &Runtime, vm: &InstanceRef, el: Option<&Handle>) -> Option<String> {
    let template = vm.borrow().options.template().cloned();
    match template {
        Some(TemplateOption::Markup(markup)) if markup.starts_with('#') => {
            let found = rt.id_to_template(&markup);
            if found.is_empty() {
                vm.borrow().warn(&format!(
                    "Template element not found or is empty: {}",
                    markup
                ));
            }
            Some(found)
        }
        Some(TemplateOption::Markup(markup)) if !markup.is_empty() => Some(markup),
        Some(TemplateOption::Node(node)) => Some(dom::inner_html(&node)),
        Some(TemplateOption::Invalid(value)) => {
            vm.borrow()
                .warn(&format!("invalid template option: {}", value));
            None
        }
        // An empty template counts as absent.
        Some(TemplateOption::Markup(_)) | None => Some(el.map(dom::outer_html).unwrap_or_default()),
    }
}

fn compile_into(rt: &Runtime, vm: &InstanceRef, template: &str) {
    let measure = rt.perf_active();
    if measure {
        rt.perf().mark("compile");
    }

    let config = {
        let guard = vm.borrow();
        CompileConfig {
            output_source_range: rt.config().dev_mode(),
            should_decode_newlines: rt.should_decode_newlines(),
            should_decode_newlines_for_href: rt.should_decode_newlines_for_href(),
            delimiters: guard.options.delimiters().cloned(),
            comments: guard.options.comments(),
        }
    };
    let compiled = rt.compiler().compile(template, &config);

    {
        let guard = vm.borrow();
        for err in &compiled.errors {
            guard.warn(&format!(
                "Error compiling template:\n\n{}\n\n- {}",
                template, err
            ));
        }
    }

    vm.borrow_mut()
        .options
        .set_render(compiled.render, compiled.static_render_fns);

    if measure {
        rt.perf().mark("compile end");
        let name = format_component_name(&vm.borrow());
        rt.perf()
            .measure(&format!("{} compile", name), "compile", "compile end");
    }
}
