//! VNC session events and input commands

/// Rectangle coordinates for framebuffer operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VncRect {
    /// X coordinate
    pub x: u16,
    /// Y coordinate
    pub y: u16,
    /// Width
    pub width: u16,
    /// Height
    pub height: u16,
}

impl VncRect {
    /// Creates a new rectangle
    #[must_use]
    pub const fn new(x: u16, y: u16, width: u16, height: u16) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Events emitted by the protocol thread toward the owner
#[derive(Debug, Clone)]
pub enum VncSessionEvent {
    /// Connection closed
    Disconnected,

    /// Resolution changed
    ResolutionChanged {
        /// New framebuffer width in pixels
        width: u32,
        /// New framebuffer height in pixels
        height: u32,
    },

    /// Framebuffer update
    FrameUpdate {
        /// Updated region
        rect: VncRect,
        /// BGRA pixel data for the region
        data: Vec<u8>,
    },

    /// Copy rectangle from source to destination
    CopyRect {
        /// Destination region
        dst: VncRect,
        /// Source region
        src: VncRect,
    },

    /// Cursor shape update
    CursorUpdate {
        /// Cursor bounds with the hotspot at the rectangle origin
        rect: VncRect,
        /// BGRA cursor pixel data
        data: Vec<u8>,
    },

    /// Server sent bell notification
    Bell,

    /// Server clipboard text
    ClipboardText(String),

    /// Fatal protocol or transport error
    Error(String),
}

/// Input commands sent from the owner to the protocol thread
#[derive(Debug, Clone)]
pub enum VncInput {
    /// Disconnect from the server
    Disconnect,

    /// Keyboard event
    KeyEvent {
        /// X11 keysym
        keysym: u32,
        /// True on press, false on release
        pressed: bool,
    },

    /// Pointer event
    PointerEvent {
        /// X coordinate
        x: u16,
        /// Y coordinate
        y: u16,
        /// Button mask
        buttons: u8,
    },

    /// Send clipboard text to the server
    ClipboardText(String),

    /// Request a full framebuffer refresh
    RefreshScreen,
}
