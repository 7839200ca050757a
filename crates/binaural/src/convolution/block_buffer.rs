/// Adapts arbitrary-length interleaved I/O to fixed-size blocks.
///
/// Input is collected until a whole block is available, which is then rendered; output is drained from the previous
/// block's result.  This costs exactly one block of latency and never allocates.
pub(crate) struct BlockBuffer {
    frames: usize,
    input_channels: usize,
    output_channels: usize,
    input: Box<[f32]>,
    output: Box<[f32]>,
    /// Frames of `input` filled so far, which is also how many frames of `output` were drained.
    filled: usize,
}

impl BlockBuffer {
    pub(crate) fn new(frames: usize, input_channels: usize, output_channels: usize) -> BlockBuffer {
        BlockBuffer {
            frames,
            input_channels,
            output_channels,
            input: vec![0.0f32; frames * input_channels].into_boxed_slice(),
            output: vec![0.0f32; frames * output_channels].into_boxed_slice(),
            filled: 0,
        }
    }

    /// Push `input` through `render`, one block at a time.
    ///
    /// `render` receives a full block of interleaved input and must overwrite the block of interleaved output.  The
    /// caller guarantees that `input` and `output` hold the same number of frames.
    pub(crate) fn process(
        &mut self,
        input: &[f32],
        output: &mut [f32],
        mut render: impl FnMut(&[f32], &mut [f32]),
    ) {
        let ichans = self.input_channels;
        let ochans = self.output_channels;
        let total = input.len() / ichans;
        debug_assert_eq!(total * ochans, output.len());

        let mut done = 0;
        while done < total {
            let will_do = (self.frames - self.filled).min(total - done);

            self.input[self.filled * ichans..(self.filled + will_do) * ichans]
                .copy_from_slice(&input[done * ichans..(done + will_do) * ichans]);
            output[done * ochans..(done + will_do) * ochans].copy_from_slice(
                &self.output[self.filled * ochans..(self.filled + will_do) * ochans],
            );

            self.filled += will_do;
            done += will_do;

            if self.filled == self.frames {
                render(&self.input, &mut self.output);
                self.filled = 0;
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.input.fill(0.0);
        self.output.fill(0.0);
        self.filled = 0;
    }
}
