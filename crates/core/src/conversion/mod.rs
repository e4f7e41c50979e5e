pub mod sensor_frame;
pub mod yuv;
