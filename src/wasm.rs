use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use crate::config::DreamConfig;
use crate::frame::{FrameDriver, FrameReport};
use crate::gpu::surface::SurfaceBackend;
use crate::worlds::{World, WorldKind};

#[wasm_bindgen]
pub struct WasmDreamscape {
    inner: Rc<RefCell<DreamscapeContext>>,
}

struct DreamscapeContext {
    backend: SurfaceBackend<'static>,
    driver: FrameDriver,
    last_report: Option<FrameReport>,
}

#[wasm_bindgen]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
    let _ = console_log::init_with_level(log::Level::Info);
}

#[wasm_bindgen]
impl WasmDreamscape {
    pub fn pointer_move(&self, x: f32, y: f32) {
        self.inner.borrow_mut().driver.on_pointer_move(x, y);
    }

    pub fn click(&self) {
        self.inner.borrow_mut().driver.on_click();
    }

    pub fn resize(&self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        let mut inner = self.inner.borrow_mut();
        let ctx = &mut *inner;
        ctx.backend.resize(width, height);
        ctx.driver.resize(width as f32, height as f32);
    }

    pub fn render(&self, dt: f32) {
        let mut inner = self.inner.borrow_mut();
        let ctx = &mut *inner;
        let report = ctx.driver.tick(dt, &mut ctx.backend);
        ctx.last_report = Some(report);
    }

    /// Host-driven content-ready signal; the driver also raises it itself
    /// once every animated material is live.
    pub fn signal_content_ready(&self) {
        self.inner.borrow_mut().driver.signal_content_ready();
    }

    pub fn title(&self) -> String {
        self.inner.borrow().driver.focus_text().title.clone()
    }

    pub fn description(&self) -> String {
        self.inner.borrow().driver.focus_text().description.clone()
    }

    /// Changes whenever title/description change.
    pub fn focus_revision(&self) -> u32 {
        self.inner.borrow().driver.focus_text().revision as u32
    }

    /// Opacity the host should apply to its overlay text.
    pub fn surface_opacity(&self) -> f32 {
        self.inner
            .borrow()
            .last_report
            .as_ref()
            .map(|r| r.surface_opacity)
            .unwrap_or(0.0)
    }

    /// Switch a post effect on or off. Returns false for unknown effects.
    pub fn set_effect_enabled(&self, effect_id: &str, enabled: bool) -> bool {
        self.inner.borrow_mut().driver.set_effect_enabled(effect_id, enabled)
    }

    pub fn is_transitioning(&self) -> bool {
        self.inner.borrow().driver.state() == crate::frame::DriverState::Transitioning
    }

    pub fn last_report_json(&self) -> String {
        let inner = self.inner.borrow();
        serde_json::to_string(&inner.last_report).unwrap_or_else(|_| "null".to_string())
    }

    /// Rebuild the current world with a new config.
    /// Returns false (and keeps the old scene) if the config is invalid.
    pub fn set_config_json(&self, json: &str) -> bool {
        let config = match DreamConfig::from_json(json) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Failed to parse dreamscape config: {:#}", e);
                return false;
            }
        };
        let mut inner = self.inner.borrow_mut();
        let kind = inner.driver.world().kind;
        match World::build(kind, &config) {
            Ok(world) => {
                let (width, height) = inner.backend.size();
                let mut driver = FrameDriver::new(world, config);
                driver.resize(width as f32, height as f32);
                inner.driver = driver;
                inner.last_report = None;
                true
            }
            Err(e) => {
                log::error!("Failed to rebuild world '{}': {:#}", kind, e);
                false
            }
        }
    }
}

#[wasm_bindgen]
pub async fn create_dreamscape(canvas: HtmlCanvasElement, world: &str) -> Result<WasmDreamscape, JsValue> {
    init_panic_hook();

    let kind: WorldKind = world.parse().map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;
    let config = DreamConfig::default();
    let scene = World::build(kind, &config).map_err(|e| JsValue::from_str(&format!("{:#}", e)))?;

    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: wgpu::Backends::all(),
        dx12_shader_compiler: Default::default(),
        flags: wgpu::InstanceFlags::default(),
        gles_minor_version: wgpu::Gles3MinorVersion::Automatic,
    });

    let (width, height) = (canvas.width(), canvas.height());
    let target = wgpu::SurfaceTarget::Canvas(canvas);
    let surface = instance.create_surface(target)
        .map_err(|e| JsValue::from_str(&format!("Failed to create surface: {}", e)))?;

    let adapter = instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::None,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }).await.ok_or_else(|| JsValue::from_str("Failed to find an appropriate adapter"))?;

    let (device, queue) = adapter.request_device(
        &wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
            memory_hints: Default::default(),
        },
        None,
    ).await.map_err(|e| JsValue::from_str(&format!("Failed to create device: {}", e)))?;

    let backend = SurfaceBackend::new(&adapter, device, queue, surface, width, height);
    let mut driver = FrameDriver::new(scene, config);
    driver.resize(width as f32, height as f32);

    Ok(WasmDreamscape {
        inner: Rc::new(RefCell::new(DreamscapeContext {
            backend,
            driver,
            last_report: None,
        })),
    })
}
