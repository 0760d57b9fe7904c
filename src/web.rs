#![cfg(target_arch = "wasm32")]

//! Browser entry points: hydrating generated pages and mounting widgets by
//! hand.

use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{anyhow, Result};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::HtmlElement;

use crate::background::TopographicBackground;
use crate::config::SiteConfig;
use crate::pages::{BACKGROUND_CANVAS_ID, WIDGET_CLASS};
use crate::platform::web::{browser_document, CanvasBackdrop, WebPlatform};
use crate::projects::ModelType;
use crate::widget::{SceneWidget, WidgetProps};

struct HydratedPage {
    _background: TopographicBackground<WebPlatform, CanvasBackdrop>,
    _widgets: Vec<SceneWidget<WebPlatform>>,
}

thread_local! {
    static PAGE: RefCell<Option<HydratedPage>> = const { RefCell::new(None) };
}

#[wasm_bindgen(start)]
pub fn bootstrap() {
    console_error_panic_hook::set_once();
    let _ = wasm_logger::init(wasm_logger::Config::default());
}

/// Starts the background and mounts a widget into every placeholder of the
/// current document. Calling it again replaces the previous hydration.
#[wasm_bindgen]
pub fn hydrate() -> Result<(), JsValue> {
    hydrate_page().map_err(|err| JsValue::from_str(&format!("{err:#}")))
}

fn hydrate_page() -> Result<()> {
    let previous = PAGE.with(|page| page.borrow_mut().take());
    drop(previous);

    let config = SiteConfig::compiled();
    let document = browser_document()?;

    let body = Rc::new(WebPlatform::for_body()?);
    let background =
        TopographicBackground::start(&body, CanvasBackdrop::from_element_id(BACKGROUND_CANVAS_ID));

    let placeholders = document
        .query_selector_all(&format!(".{WIDGET_CLASS}"))
        .map_err(|err| anyhow!("failed to query widget placeholders: {err:?}"))?;
    let mut widgets = Vec::new();
    for index in 0..placeholders.length() {
        let Some(element) = placeholders
            .item(index)
            .and_then(|node| node.dyn_into::<HtmlElement>().ok())
        else {
            continue;
        };
        let model = element
            .get_attribute("data-model-type")
            .map_or_else(ModelType::default, |name| ModelType::from_name_or_default(&name));
        let scale = element
            .get_attribute("data-scale")
            .and_then(|value| value.trim().parse::<f32>().ok())
            .unwrap_or(1.0);

        let platform = Rc::new(WebPlatform::new(element)?);
        let mut widget = SceneWidget::new(
            platform,
            WidgetProps::new(model).with_scale(scale),
            config.clone(),
        );
        match widget.mount() {
            Ok(()) => widgets.push(widget),
            Err(err) => log::warn!("widget {index} ({model}) was not mounted: {err}"),
        }
    }
    log::info!("hydrated {} scene widgets", widgets.len());

    PAGE.with(|page| {
        *page.borrow_mut() = Some(HydratedPage {
            _background: background,
            _widgets: widgets,
        });
    });
    Ok(())
}

/// A widget mounted from JavaScript.
#[wasm_bindgen]
pub struct WidgetHandle {
    widget: SceneWidget<WebPlatform>,
}

#[wasm_bindgen]
impl WidgetHandle {
    #[wasm_bindgen(js_name = setModelType)]
    pub fn set_model_type(&mut self, model_type: &str) -> Result<(), JsValue> {
        self.widget
            .set_model_type(ModelType::from_name_or_default(model_type))
            .map_err(|err| JsValue::from_str(&err.to_string()))
    }

    #[wasm_bindgen(js_name = isMounted)]
    pub fn is_mounted(&self) -> bool {
        self.widget.is_mounted()
    }

    pub fn unmount(&mut self) {
        self.widget.unmount();
    }
}

#[wasm_bindgen(js_name = mountWidget)]
pub fn mount_widget(
    element_id: &str,
    model_type: &str,
    scale: Option<f32>,
) -> Result<WidgetHandle, JsValue> {
    let platform = WebPlatform::for_element_id(element_id)
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    let props = WidgetProps::new(ModelType::from_name_or_default(model_type))
        .with_scale(scale.unwrap_or(1.0));
    let mut widget = SceneWidget::new(Rc::new(platform), props, SiteConfig::compiled());
    widget
        .mount()
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    Ok(WidgetHandle { widget })
}
