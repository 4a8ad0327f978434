// Windowed device against a real display and Vulkan driver:
// `cargo test --test windowed -- --ignored`.
//
// winit allows one event loop per process, so everything runs from a single
// test inside one `resumed` callback.
#![cfg(target_os = "linux")]

use clearframe::backend::FrameLayout;
use clearframe::{Device, DeviceDesc, Window};
use winit::application::ApplicationHandler;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::x11::EventLoopBuilderExtX11;
use winit::window::WindowId;

#[derive(Default)]
struct Scenario {
    outcome: Option<Result<(), String>>,
}

impl ApplicationHandler for Scenario {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.outcome.is_none() {
            self.outcome = Some(run(event_loop));
        }
        event_loop.exit();
    }

    fn window_event(&mut self, _: &ActiveEventLoop, _: WindowId, _: WindowEvent) {}
}

fn run(event_loop: &ActiveEventLoop) -> Result<(), String> {
    let window = Window::create(event_loop, "clearframe test", 320, 240, false)
        .map_err(|e| format!("window: {e}"))?;
    let mut device =
        Device::new(&DeviceDesc::default(), Some(window)).map_err(|e| format!("device: {e}"))?;

    if device.is_headless() {
        return Err("device with a window reports headless".into());
    }

    // Every per-image count equals N, with 3N command buffers and 2 semaphores.
    let info = device
        .presentation_info()
        .ok_or("windowed device has no presentation resources")?;
    let expected = FrameLayout::for_images(info.image_count);
    let measured = (
        info.framebuffer_count,
        info.fence_count,
        info.command_buffer_count,
        info.semaphore_count,
    );
    let wanted = (
        expected.framebuffers,
        expected.fences,
        expected.command_buffers(),
        expected.semaphores,
    );
    if measured != wanted {
        return Err(format!("counts {measured:?}, expected {wanted:?} for N={}", info.image_count));
    }
    if info.image_count < 1 {
        return Err("swapchain has no images".into());
    }

    // Two frames back to back: whichever index the second acquire returns,
    // its fence was re-signaled by the first submit, so neither call blocks
    // forever.
    for frame in 0..2 {
        device
            .clear_and_present(0.1, 0.2, 0.3)
            .map_err(|e| format!("frame {frame}: {e}"))?;
    }
    device.wait_idle().map_err(|e| format!("wait_idle: {e}"))?;

    if device.presentation_info() != Some(info) {
        return Err("presentation resources changed across frames".into());
    }
    Ok(())
}

#[test]
#[ignore = "requires a display and a Vulkan driver"]
fn windowed_device_counts_and_back_to_back_frames() {
    let mut builder = EventLoop::builder();
    EventLoopBuilderExtX11::with_any_thread(&mut builder, true);
    let event_loop = builder.build().unwrap();

    let mut scenario = Scenario::default();
    event_loop.run_app(&mut scenario).unwrap();

    match scenario.outcome {
        Some(Ok(())) => {}
        Some(Err(message)) => panic!("{message}"),
        None => panic!("event loop exited before resuming"),
    }
}
