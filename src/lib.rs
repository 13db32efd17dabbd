// MIT License
//
// Copyright (c) 2025 Takatoshi Kondo
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

// Firmware-side runtime for networked micro-devices.
//
// Two tightly coupled subsystems live here:
//
// - [`mqtt`] — an MQTT v5 client implemented directly over a byte stream:
//   VBI/string codecs, packet framing, keep-alive, subscription bookkeeping,
//   and a topic dispatcher.
// - [`ota`] — an update channel layered on top of the client that treats
//   MQTT topics as a content-addressed package bus for ZIP-based "wheel"
//   archives and raw source files.
//
// [`config`] loads the boundary configuration both subsystems are built
// from, [`error`] is the crate-wide error hierarchy, and [`runtime`] is the
// top-level object a device's `main` constructs to wire everything together.

pub mod config;
pub mod error;
pub mod logger;
pub mod mqtt;
pub mod ota;
pub mod runtime;

pub use error::CoreError;
