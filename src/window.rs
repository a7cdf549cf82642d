//! Native interactive host: a winit window driving the frame loop.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseButton, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

use crate::frame::FrameDriver;
use crate::gpu::surface::SurfaceBackend;

pub fn run(mut driver: FrameDriver, width: u32, height: u32) -> Result<()> {
    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("Dreamscape: {}", driver.world().kind))
            .with_inner_size(LogicalSize::new(width, height))
            .build(&event_loop)
            .context("Failed to create window")?,
    );

    let instance = wgpu::Instance::default();
    let surface = instance
        .create_surface(window.clone())
        .context("Failed to create surface")?;
    let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::HighPerformance,
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
    }))
    .ok_or_else(|| anyhow::anyhow!("No adapter found"))?;
    log::info!("Window adapter: {}", adapter.get_info().name);

    let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor::default(), None))
        .context("Failed to create device")?;

    let size = window.inner_size();
    let mut backend = SurfaceBackend::new(&adapter, device, queue, surface, size.width, size.height);
    driver.resize(size.width as f32, size.height as f32);

    let mut last_frame = Instant::now();
    let mut shown_revision = 0;

    event_loop
        .run(move |event, elwt| match event {
            Event::AboutToWait => {
                window.request_redraw();
            }
            Event::WindowEvent { event, window_id } if window_id == window.id() => match event {
                WindowEvent::CloseRequested => elwt.exit(),
                WindowEvent::Resized(size) => {
                    backend.resize(size.width, size.height);
                    driver.resize(size.width as f32, size.height as f32);
                }
                WindowEvent::CursorMoved { position, .. } => {
                    driver.on_pointer_move(position.x as f32, position.y as f32);
                }
                WindowEvent::MouseInput {
                    state: ElementState::Pressed,
                    button: MouseButton::Left,
                    ..
                } => driver.on_click(),
                WindowEvent::RedrawRequested => {
                    let now = Instant::now();
                    let dt = now.duration_since(last_frame).as_secs_f32();
                    last_frame = now;
                    driver.tick(dt, &mut backend);

                    let text = driver.focus_text();
                    if text.revision != shown_revision {
                        shown_revision = text.revision;
                        window.set_title(&format!("Dreamscape: {}", text.title));
                        log::info!("{}: {}", text.title, text.description);
                    }
                }
                _ => {}
            },
            _ => {}
        })
        .context("Event loop error")?;

    Ok(())
}
