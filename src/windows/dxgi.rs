//! DXGI Desktop Duplication capture backend.
//!
//! Each [`DxgiScreen`] owns a D3D11 device, an `IDXGIOutputDuplication` for one
//! output and a CPU-readable staging texture. A capture copies the latest
//! desktop image into an owned frame; zones are strided views into it.

use std::collections::HashMap;

use tracing::{debug, trace};
use windows::Win32::Foundation::{HMODULE, RECT};
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11_CPU_ACCESS_READ, D3D11_CREATE_DEVICE_BGRA_SUPPORT, D3D11_MAP_READ,
    D3D11_MAPPED_SUBRESOURCE, D3D11_SDK_VERSION, D3D11_TEXTURE2D_DESC, D3D11_USAGE_STAGING,
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, ID3D11Texture2D,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_FORMAT_B8G8R8A8_UNORM, DXGI_MODE_ROTATION, DXGI_MODE_ROTATION_ROTATE90,
    DXGI_MODE_ROTATION_ROTATE270, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    DXGI_ERROR_NOT_FOUND, DXGI_ERROR_WAIT_TIMEOUT, DXGI_OUTDUPL_FRAME_INFO, IDXGIAdapter,
    IDXGIDevice, IDXGIOutput, IDXGIOutput1, IDXGIOutputDuplication,
};
use windows::core::Interface;

use crate::capture::{CaptureDevice, CaptureZone, Display, PixelView, ScreenCapture, ZoneId};
use crate::{Result, SyncError};

/// How long a capture waits for the compositor before reusing the last frame.
const ACQUIRE_TIMEOUT_MS: u32 = 100;

fn dxgi_error(operation: &str, err: windows::core::Error) -> SyncError {
    SyncError::Capture { reason: format!("{operation} failed"), source: Some(Box::new(err)) }
}

fn create_device() -> Result<(ID3D11Device, ID3D11DeviceContext)> {
    let mut device = None;
    let mut context = None;
    unsafe {
        D3D11CreateDevice(
            None::<&IDXGIAdapter>,
            D3D_DRIVER_TYPE_HARDWARE,
            HMODULE::default(),
            D3D11_CREATE_DEVICE_BGRA_SUPPORT,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
        .map_err(|e| dxgi_error("D3D11CreateDevice", e))?;
    }

    let device = device.ok_or_else(|| SyncError::capture_failed("D3D11 device is None"))?;
    let context = context.ok_or_else(|| SyncError::capture_failed("D3D11 context is None"))?;
    Ok((device, context))
}

/// Size of the duplicated desktop image for an output.
///
/// `DesktopCoordinates` are in rotated desktop space while duplication hands
/// out the unrotated surface, so portrait outputs swap the axes.
fn frame_size(desktop: RECT, rotation: DXGI_MODE_ROTATION) -> (u32, u32) {
    let width = (desktop.right - desktop.left).unsigned_abs();
    let height = (desktop.bottom - desktop.top).unsigned_abs();
    if rotation == DXGI_MODE_ROTATION_ROTATE90 || rotation == DXGI_MODE_ROTATION_ROTATE270 {
        (height, width)
    } else {
        (width, height)
    }
}

fn adapter_of(device: &ID3D11Device) -> Result<IDXGIAdapter> {
    let dxgi_device: IDXGIDevice = device.cast().map_err(|e| dxgi_error("Cast to IDXGIDevice", e))?;
    unsafe { dxgi_device.GetAdapter() }.map_err(|e| dxgi_error("GetAdapter", e))
}

/// Outputs of the default hardware adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DxgiCaptureDevice;

impl CaptureDevice for DxgiCaptureDevice {
    type Screen = DxgiScreen;

    fn displays(&self) -> Result<Vec<Display>> {
        let (device, _) = create_device()?;
        let adapter = adapter_of(&device)?;

        let mut displays = Vec::new();
        for index in 0.. {
            let output: IDXGIOutput = match unsafe { adapter.EnumOutputs(index) } {
                Ok(output) => output,
                Err(e) if e.code() == DXGI_ERROR_NOT_FOUND => break,
                Err(e) => return Err(dxgi_error("EnumOutputs", e)),
            };
            let desc = unsafe { output.GetDesc() }.map_err(|e| dxgi_error("GetDesc", e))?;

            let name_len = desc.DeviceName.iter().position(|&c| c == 0).unwrap_or(desc.DeviceName.len());
            let (width, height) = frame_size(desc.DesktopCoordinates, desc.Rotation);
            displays.push(Display {
                id: index,
                name: String::from_utf16_lossy(&desc.DeviceName[..name_len]),
                width,
                height,
            });
        }

        debug!(count = displays.len(), "Enumerated DXGI outputs");
        Ok(displays)
    }

    fn open_display(&self, display: &Display) -> Result<DxgiScreen> {
        DxgiScreen::new(display.id)
    }
}

/// Desktop duplication session for one output.
pub struct DxgiScreen {
    width: u32,
    height: u32,
    stride: usize,
    frame: Vec<u8>,
    zones: HashMap<ZoneId, CaptureZone>,
    next_zone: u32,
    _device: ID3D11Device,
    context: ID3D11DeviceContext,
    duplication: IDXGIOutputDuplication,
    staging_texture: ID3D11Texture2D,
}

// SAFETY: the COM objects are only touched through `&mut self` (or `&self`
// reads of the owned frame), which the capture adapter serializes on its lock
unsafe impl Send for DxgiScreen {}

impl DxgiScreen {
    pub fn new(output_index: u32) -> Result<Self> {
        let (device, context) = create_device()?;
        let adapter = adapter_of(&device)?;

        let output: IDXGIOutput = unsafe { adapter.EnumOutputs(output_index) }
            .map_err(|e| dxgi_error("EnumOutputs", e))?;
        let desc = unsafe { output.GetDesc() }.map_err(|e| dxgi_error("GetDesc", e))?;
        let (width, height) = frame_size(desc.DesktopCoordinates, desc.Rotation);

        let output1: IDXGIOutput1 = output.cast().map_err(|e| dxgi_error("Cast to IDXGIOutput1", e))?;
        let duplication =
            unsafe { output1.DuplicateOutput(&device) }.map_err(|e| dxgi_error("DuplicateOutput", e))?;

        let mode = unsafe { duplication.GetDesc() }.ModeDesc;
        if (mode.Width, mode.Height) != (width, height) {
            return Err(SyncError::capture_failed(format!(
                "Duplicated mode {}x{} does not match output {width}x{height}",
                mode.Width, mode.Height
            )));
        }

        let staging_desc = D3D11_TEXTURE2D_DESC {
            Width: width,
            Height: height,
            MipLevels: 1,
            ArraySize: 1,
            Format: DXGI_FORMAT_B8G8R8A8_UNORM,
            SampleDesc: DXGI_SAMPLE_DESC { Count: 1, Quality: 0 },
            Usage: D3D11_USAGE_STAGING,
            BindFlags: 0,
            CPUAccessFlags: D3D11_CPU_ACCESS_READ.0 as u32,
            MiscFlags: 0,
        };

        let mut staging_texture = None;
        unsafe { device.CreateTexture2D(&staging_desc, None, Some(&mut staging_texture)) }
            .map_err(|e| dxgi_error("CreateTexture2D", e))?;
        let staging_texture =
            staging_texture.ok_or_else(|| SyncError::capture_failed("Staging texture is None"))?;

        // Row pitch is only known after the first map
        let stride = width as usize * 4;
        debug!(output_index, width, height, "Started desktop duplication");

        Ok(Self {
            width,
            height,
            stride,
            frame: vec![0; stride * height as usize],
            zones: HashMap::new(),
            next_zone: 0,
            _device: device,
            context,
            duplication,
            staging_texture,
        })
    }

    fn copy_next_frame(&mut self) -> Result<bool> {
        let mut frame_info = DXGI_OUTDUPL_FRAME_INFO::default();
        let mut resource = None;

        match unsafe {
            self.duplication.AcquireNextFrame(ACQUIRE_TIMEOUT_MS, &mut frame_info, &mut resource)
        } {
            Ok(()) => {}
            Err(e) if e.code() == DXGI_ERROR_WAIT_TIMEOUT => return Ok(false),
            Err(e) => return Err(dxgi_error("AcquireNextFrame", e)),
        }

        let resource = resource.ok_or_else(|| {
            let _ = unsafe { self.duplication.ReleaseFrame() };
            SyncError::capture_failed("Acquired resource is None")
        })?;
        let texture: ID3D11Texture2D = resource.cast().map_err(|e| {
            let _ = unsafe { self.duplication.ReleaseFrame() };
            dxgi_error("Cast to ID3D11Texture2D", e)
        })?;

        unsafe { self.context.CopyResource(&self.staging_texture, &texture) };
        let _ = unsafe { self.duplication.ReleaseFrame() };

        let mut mapped = D3D11_MAPPED_SUBRESOURCE::default();
        unsafe { self.context.Map(&self.staging_texture, 0, D3D11_MAP_READ, 0, Some(&mut mapped)) }
            .map_err(|e| dxgi_error("Map", e))?;

        let stride = mapped.RowPitch as usize;
        let total = stride * self.height as usize;
        let src = unsafe { std::slice::from_raw_parts(mapped.pData as *const u8, total) };
        self.frame.clear();
        self.frame.extend_from_slice(src);
        self.stride = stride;

        unsafe { self.context.Unmap(&self.staging_texture, 0) };
        Ok(true)
    }
}

impl ScreenCapture for DxgiScreen {
    fn register_zone(&mut self, zone: CaptureZone) -> Result<ZoneId> {
        if !zone.fits_within(self.width, self.height) {
            return Err(SyncError::invalid_state(format!(
                "Zone {zone} exceeds the {}x{} frame",
                self.width, self.height
            )));
        }
        let id = ZoneId(self.next_zone);
        self.next_zone += 1;
        self.zones.insert(id, zone);
        Ok(id)
    }

    fn unregister_zone(&mut self, zone: ZoneId) {
        self.zones.remove(&zone);
    }

    fn capture(&mut self) -> Result<()> {
        let updated = self.copy_next_frame()?;
        if !updated {
            trace!("Desktop unchanged, reusing previous frame");
        }
        Ok(())
    }

    fn zone_view(&self, zone: ZoneId) -> Result<PixelView<'_>> {
        let zone = self
            .zones
            .get(&zone)
            .ok_or_else(|| SyncError::invalid_state("Capture zone is not registered"))?;
        PixelView::new(self.width, self.height, self.stride, &self.frame)?.crop(zone)
    }
}

#[cfg(all(test, windows))]
mod tests {
    use super::*;
    use windows::Win32::Graphics::Dxgi::Common::{
        DXGI_MODE_ROTATION_IDENTITY, DXGI_MODE_ROTATION_UNSPECIFIED,
    };

    const PORTRAIT: RECT = RECT { left: 1920, top: 0, right: 3000, bottom: 1920 };

    #[test]
    fn landscape_outputs_keep_their_desktop_size() {
        let desktop = RECT { left: 0, top: 0, right: 1920, bottom: 1080 };
        assert_eq!(frame_size(desktop, DXGI_MODE_ROTATION_IDENTITY), (1920, 1080));
        assert_eq!(frame_size(desktop, DXGI_MODE_ROTATION_UNSPECIFIED), (1920, 1080));
    }

    #[test]
    fn rotated_outputs_report_the_unrotated_frame() {
        assert_eq!(frame_size(PORTRAIT, DXGI_MODE_ROTATION_ROTATE90), (1920, 1080));
        assert_eq!(frame_size(PORTRAIT, DXGI_MODE_ROTATION_ROTATE270), (1920, 1080));
    }
}
