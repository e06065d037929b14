mod response_decoder;
